use crate::search::SearchResult;

pub const NO_SOURCES_CONTEXT: &str =
    "No search results available. Provide insights based on general marketing knowledge.";

const ANALYST_ROLE: &str =
    "You are an expert marketing analyst. Analyze this marketing query and provide actionable insights.";

const INSTRUCTIONS: &str = r#"INSTRUCTIONS:
1. Generate 3-5 high-quality marketing insights
2. Each insight must have: title, detail, confidence (0.7-0.95), category
3. Categories can be: Strategy, Channels, Content, Analytics, Audience, ROI, Tools
4. Use specific data from search results
5. Make insights actionable"#;

const OUTPUT_FORMAT: &str = r#"CRITICAL: Return ONLY this JSON structure (no other text):
{
    "insights": [
        {
            "title": "Content Marketing Drives B2B Growth",
            "detail": "Content marketing generates 3x more leads than traditional methods. Focus on long-form blog posts, whitepapers, and case studies to establish thought leadership.",
            "confidence": 0.87,
            "category": "Strategy"
        },
        {
            "title": "LinkedIn Outperforms for Professional Engagement",
            "detail": "LinkedIn delivers the highest B2B engagement rates at 2.8% compared to 0.5% on other platforms. Invest in LinkedIn Ads and organic content strategy.",
            "confidence": 0.82,
            "category": "Channels"
        }
    ]
}

Return ONLY the JSON object above with 3-5 insights. No explanation, no markdown formatting."#;

/// Numbered source listing embedded in the prompt.
pub fn source_context(sources: &[SearchResult]) -> String {
    if sources.is_empty() {
        return NO_SOURCES_CONTEXT.into();
    }
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("Source {}: {}\n{}\nURL: {}", i + 1, s.title, s.snippet, s.url))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn insight_prompt(query: &str, sources: &[SearchResult]) -> String {
    format!(
        "{ANALYST_ROLE}\n\nMarketing Query: {query}\n\nWeb Search Results:\n{}\n\n{INSTRUCTIONS}\n\n{OUTPUT_FORMAT}",
        source_context(sources)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(title: &str, url: &str, snippet: &str) -> SearchResult {
        SearchResult { title: title.into(), url: url.into(), snippet: snippet.into() }
    }

    #[test]
    fn empty_sources_use_placeholder() {
        let prompt = insight_prompt("grow newsletter signups", &[]);
        assert!(prompt.contains("Marketing Query: grow newsletter signups"));
        assert!(prompt.contains(NO_SOURCES_CONTEXT));
    }

    #[test]
    fn sources_are_numbered_in_order() {
        let ctx = source_context(&[
            source("First", "https://a.example", "alpha"),
            source("Second", "https://b.example", "beta"),
        ]);
        assert_eq!(
            ctx,
            "Source 1: First\nalpha\nURL: https://a.example\n\nSource 2: Second\nbeta\nURL: https://b.example"
        );
    }

    #[test]
    fn prompt_is_deterministic_and_carries_format_rules() {
        let sources = [source("T", "https://t.example", "s")];
        let a = insight_prompt("q", &sources);
        assert_eq!(a, insight_prompt("q", &sources));
        assert!(a.contains("confidence (0.7-0.95)"));
        assert!(a.contains("Strategy, Channels, Content, Analytics, Audience, ROI, Tools"));
        assert!(a.contains("\"insights\": ["));
    }
}
