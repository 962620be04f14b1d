mod url;

pub use self::url::{
    iso8601, AnalyticsResponse, ClickEvent, ClickSummary, CreateShortUrlRequest,
    CreateShortUrlResponse, NewShortUrl, ShortUrlRecord, DIRECT_REFERRER, UNKNOWN_COUNTRY,
};
