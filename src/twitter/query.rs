//! Search query string composition.
//!
//! Terms are emitted in a fixed order regardless of how they were supplied:
//! `from:<author>`, then `-filters:<filters>`, then `#<hashtag>`, separated by
//! single spaces. Values are passed through without validation.

/// Terms of one search query. All optional; an empty set builds `""`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryTerms<'a> {
    pub author: Option<&'a str>,
    pub filters: Option<&'a str>,
    pub hashtag: Option<&'a str>,
}

/// Build the search API query string.
///
/// An empty result means "no query"; callers must not send it.
pub fn build(terms: &QueryTerms<'_>) -> String {
    let parts = [
        terms.author.map(|v| ("from:", v)),
        terms.filters.map(|v| ("-filters:", v)),
        terms.hashtag.map(|v| ("#", v)),
    ];

    let mut q = String::new();
    for (keyword, value) in parts.into_iter().flatten() {
        if !q.is_empty() {
            q.push(' ');
        }
        q.push_str(keyword);
        q.push_str(value);
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_only() {
        let terms = QueryTerms {
            author: Some("wojespn"),
            ..Default::default()
        };
        assert_eq!(build(&terms), "from:wojespn");
    }

    #[test]
    fn test_author_and_filters() {
        let terms = QueryTerms {
            author: Some("a"),
            filters: Some("b"),
            ..Default::default()
        };
        assert_eq!(build(&terms), "from:a -filters:b");
    }

    #[test]
    fn test_empty_terms_build_empty_query() {
        assert_eq!(build(&QueryTerms::default()), "");
    }

    #[test]
    fn test_all_terms_in_fixed_order() {
        let terms = QueryTerms {
            hashtag: Some("NBA"),
            filters: Some("retweets"),
            author: Some("ShamsCharania"),
        };
        assert_eq!(build(&terms), "from:ShamsCharania -filters:retweets #NBA");
    }

    #[test]
    fn test_hashtag_without_author_has_no_leading_space() {
        let terms = QueryTerms {
            hashtag: Some("Lakers"),
            ..Default::default()
        };
        assert_eq!(build(&terms), "#Lakers");
    }

    #[test]
    fn test_values_pass_through_unvalidated() {
        let terms = QueryTerms {
            author: Some("not a handle!"),
            ..Default::default()
        };
        assert_eq!(build(&terms), "from:not a handle!");
    }
}
