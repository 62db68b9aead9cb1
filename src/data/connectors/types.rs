/// Input files of a file-backed run, one per collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFile {
    Profiles,
    GlobalContext,
    PaymentHistory,
    Commerce,
    Pageviews,
}

impl SourceFile {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Profiles => "profiles.csv",
            Self::GlobalContext => "global_context.csv",
            Self::PaymentHistory => "payment_history.csv",
            Self::Commerce => "commerce.csv",
            Self::Pageviews => "pageviews.csv",
        }
    }

    /// Columns that must be present for the file to be usable
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Profiles => &["date", "browser_id"],
            Self::GlobalContext => &["date", "article_pageviews_count", "sum_paid", "payment_count"],
            Self::PaymentHistory => &["user_id", "clv", "days_since_last_subscription", "last_subscription_end"],
            Self::Commerce => &["browser_id", "user_id", "time", "step"],
            Self::Pageviews => &["browser_id", "user_id", "time", "subscriber"],
        }
    }
}
