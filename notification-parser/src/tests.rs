#[cfg(test)]
mod tests {
    use crate::{decode_redirect_param, looks_like_comment_id, NotificationParser};

    const SUBJECT: &str = "F5Bot found something: debt recycling";

    fn redirect_for(destination: &str) -> String {
        format!(
            "https://f5bot.com/url?u={}&i=98765&h=abcdef",
            urlencoding::encode(destination)
        )
    }

    fn f5bot_body(destination: &str, comment_text: &str) -> String {
        format!(
            "Reddit Comments (/r/AusFinance): 'Debt recycling with an offset account'\n\
             {}\n\
             {}\n\n\
             Do you have comments or suggestions about F5Bot? Just reply to this email.\n\
             You are receiving this because you signed up at f5bot.com. admin@f5bot.com\n",
            redirect_for(destination),
            comment_text
        )
    }

    #[test]
    fn test_scenario_comment_permalink() {
        let parser = NotificationParser::new();
        let body = "...https://f5bot.com/url?u=https%3A%2F%2Fwww.reddit.com%2Fr%2Faustralianfinance%2Fcomments%2Fabc123%2Fsome_title%2Fc%2Fdef456 ... Do you have comments? ...";

        let parsed = parser.parse(body, SUBJECT).expect("should parse");
        assert_eq!(
            parsed.url,
            "https://www.reddit.com/r/australianfinance/comments/abc123/some_title/c/def456"
        );
        assert_eq!(parsed.post_id, "abc123");
        assert_eq!(parsed.comment_id.as_deref(), Some("def456"));
        assert!(parsed.is_comment());
        assert!(!parsed.content.trim().is_empty());
        assert_eq!(parsed.subject, SUBJECT);
    }

    #[test]
    fn test_redirect_destination_is_recovered_exactly() {
        let parser = NotificationParser::new();
        let destinations = [
            "https://www.reddit.com/r/AusFinance/comments/1abcde/is_debt_recycling_worth_it/",
            "https://www.reddit.com/r/fiaustralia/comments/zz9y8x/offset-vs-redraw-for-debt-recycling/k2j3h4/",
            "https://old.reddit.com/r/AusProperty/comments/q1w2e3/title/c/r4t5y6?context=3",
            "https://www.reddit.com/r/AusFinance/comments/a1b2c3/what_is_50%_lvr/",
        ];

        for destination in destinations {
            let body = f5bot_body(destination, "Some comment text.");
            let parsed = parser.parse(&body, SUBJECT).expect("should parse");
            assert_eq!(parsed.url, destination);
        }
    }

    #[test]
    fn test_decode_redirect_param_keeps_undecodable_input() {
        assert_eq!(
            decode_redirect_param("https%3A%2F%2Freddit.com"),
            "https://reddit.com"
        );
        // %FF alone is not valid UTF-8
        assert_eq!(decode_redirect_param("abc%FF"), "abc%FF");
    }

    #[test]
    fn test_explicit_comment_marker() {
        let parser = NotificationParser::new();

        let (post, comment) = parser
            .extract_ids("https://www.reddit.com/r/AusFinance/comments/p0st1d/a-very-long-post-title-slug/c/k9x8z7")
            .unwrap();
        assert_eq!(post, "p0st1d");
        assert_eq!(comment.as_deref(), Some("k9x8z7"));

        let (post, comment) = parser
            .extract_ids("https://www.reddit.com/r/AusFinance/comments/p0st1d/c/k9x8z7")
            .unwrap();
        assert_eq!(post, "p0st1d");
        assert_eq!(comment.as_deref(), Some("k9x8z7"));
    }

    #[test]
    fn test_trailing_segment_heuristic() {
        let parser = NotificationParser::new();

        let (_, comment) = parser
            .extract_ids("https://www.reddit.com/r/AusFinance/comments/p0st1d/some_title/k9x8z7/")
            .unwrap();
        assert_eq!(comment.as_deref(), Some("k9x8z7"));

        let (_, comment) = parser
            .extract_ids(
                "https://www.reddit.com/r/AusFinance/comments/p0st1d/some_title/this_is_definitely_not_an_id/",
            )
            .unwrap();
        assert_eq!(comment, None);
    }

    #[test]
    fn test_slug_is_never_a_comment_id() {
        let parser = NotificationParser::new();
        let slugs = [
            "debt-recycling",
            "how_does_debt_recycling_work_here",
            "is-it-worth-it-to-debt-recycle-with-a-small-loan",
            "short",
        ];

        for slug in slugs {
            let url = format!("https://www.reddit.com/r/AusFinance/comments/p0st1d/{}/", slug);
            let (post, comment) = parser.extract_ids(&url).unwrap();
            assert_eq!(post, "p0st1d");
            assert_eq!(comment, None, "slug {slug} was taken for a comment id");
        }
    }

    #[test]
    fn test_looks_like_comment_id() {
        assert!(looks_like_comment_id("def456"));
        assert!(looks_like_comment_id("k2j3h4"));
        assert!(!looks_like_comment_id(""));
        assert!(!looks_like_comment_id("has-hyphen"));
        assert!(!looks_like_comment_id("abcdefghijklmnopqrst"));
        assert!(looks_like_comment_id("abcdefghijklmnopqrs"));
    }

    #[test]
    fn test_query_string_is_ignored_for_ids() {
        let parser = NotificationParser::new();
        let (post, comment) = parser
            .extract_ids("https://www.reddit.com/r/AusFinance/comments/abc123/title/?utm_source=share&utm_medium=web")
            .unwrap();
        assert_eq!(post, "abc123");
        assert_eq!(comment, None);
    }

    #[test]
    fn test_direct_link_fallback() {
        let parser = NotificationParser::new();
        let body = "New mention: https://www.reddit.com/r/AusFinance/comments/xyz789/debt_recycling_question/ (posted 5m ago)";

        let parsed = parser.parse(body, SUBJECT).expect("should parse");
        assert_eq!(
            parsed.url,
            "https://www.reddit.com/r/AusFinance/comments/xyz789/debt_recycling_question/"
        );
        assert_eq!(parsed.post_id, "xyz789");
        assert!(!parsed.is_comment());
        assert!(parsed.content.starts_with(SUBJECT));
    }

    #[test]
    fn test_not_parseable_without_links() {
        let parser = NotificationParser::new();
        assert!(parser
            .parse("Your weekly F5Bot digest has no matches.", SUBJECT)
            .is_none());
    }

    #[test]
    fn test_redirect_to_non_permalink_is_not_parseable() {
        let parser = NotificationParser::new();
        let body = format!("See {}", redirect_for("https://news.ycombinator.com/item?id=1"));
        assert!(parser.parse(&body, SUBJECT).is_none());
    }

    #[test]
    fn test_content_combines_title_and_comment_and_drops_footer() {
        let parser = NotificationParser::new();
        let body = f5bot_body(
            "https://www.reddit.com/r/AusFinance/comments/abc123/offset_account/c/def456",
            "I'm thinking about splitting my loan and using the redraw to buy ETFs each month.",
        );

        let parsed = parser.parse(&body, SUBJECT).unwrap();
        assert!(parsed
            .content
            .starts_with("Debt recycling with an offset account\n\n"));
        assert!(parsed.content.contains("splitting my loan"));
        assert!(!parsed.content.contains("Do you have comments"));
        assert!(!parsed.content.contains("You are receiving"));
        assert!(!parsed.content.contains("admin@f5bot.com"));
    }

    #[test]
    fn test_title_not_repeated_when_already_in_content() {
        let parser = NotificationParser::new();
        let body = f5bot_body(
            "https://www.reddit.com/r/AusFinance/comments/abc123/offset_account/",
            "Debt recycling with an offset account - is it possible at all with my bank?",
        );

        let parsed = parser.parse(&body, SUBJECT).unwrap();
        assert_eq!(parsed.content.matches("offset account").count(), 1);
    }

    #[test]
    fn test_title_only_when_comment_text_is_empty() {
        let parser = NotificationParser::new();
        let body = f5bot_body(
            "https://www.reddit.com/r/AusFinance/comments/abc123/offset_account/",
            "",
        );

        let parsed = parser.parse(&body, SUBJECT).unwrap();
        assert_eq!(parsed.content, "Debt recycling with an offset account");
    }

    #[test]
    fn test_short_untitled_snippet_falls_back_to_subject_and_body() {
        let parser = NotificationParser::new();
        let body = format!(
            "{}\nok\nDo you have comments?",
            redirect_for("https://www.reddit.com/r/AusFinance/comments/abc123/t/")
        );

        let parsed = parser.parse(&body, SUBJECT).unwrap();
        assert!(parsed.content.starts_with(SUBJECT));
        assert!(parsed.content.contains("f5bot.com/url"));
    }

    #[test]
    fn test_fallback_body_prefix_respects_char_boundaries() {
        let parser = NotificationParser::new();
        let body = format!(
            "{} https://www.reddit.com/r/AusFinance/comments/abc123/t/",
            "é".repeat(600)
        );

        let parsed = parser.parse(&body, SUBJECT).unwrap();
        let prefix = parsed.content.trim_start_matches(SUBJECT).trim();
        assert_eq!(prefix.chars().count(), 500);
    }

    #[test]
    fn test_quoted_printable_body() {
        let parser = NotificationParser::new();
        let body = "Reddit Comments (/r/AusFinance): 'Debt recycling'\n\
                    https://f5bot.com/url?u=3Dhttps%3A%2F%2Fwww.reddit.com%2Fr%2FAusFinance%2Fcomm=\n\
                    ents%2Fabc123%2Ftitle%2Fc%2Fdef456&i=3D1\n\
                    When you recycle debt the interest on the investment loan becomes deductible=\n\
                    =2C which is the whole point.\n\
                    Do you have comments?";

        let parsed = parser.parse(body, SUBJECT).expect("should parse");
        assert_eq!(
            parsed.url,
            "https://www.reddit.com/r/AusFinance/comments/abc123/title/c/def456"
        );
        assert_eq!(parsed.comment_id.as_deref(), Some("def456"));
        assert!(parsed.content.contains("deductible, which is the whole point."));
    }
}
