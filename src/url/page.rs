use url::Url;

const PAGE_PARAM: &str = "page";

/// Builds the URL of listing page `page` from the configured start URL
///
/// Any existing `page` query parameter is replaced; all other parameters
/// keep their order.
pub fn listing_url(start: &Url, page: u32) -> Url {
    let kept: Vec<(String, String)> = start
        .query_pairs()
        .filter(|(key, _)| key != PAGE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = start.clone();
    url.set_query(None);
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
        pairs.append_pair(PAGE_PARAM, &page.to_string());
    }
    url
}

/// Reads the `page` query parameter, if present and numeric
pub fn page_number(url: &Url) -> Option<u32> {
    url.query_pairs()
        .find(|(key, _)| key == PAGE_PARAM)
        .and_then(|(_, value)| value.parse().ok())
}
