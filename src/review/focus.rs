//! Review focus and its per-paper extraction template.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Aspect of each paper the review concentrates on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewFocus {
    /// Study design, sample, techniques and analysis.
    Methodology,
    /// Main findings and their significance.
    Results,
    /// Methodological and sampling weaknesses.
    Limitations,
    /// Executive summary of the whole paper.
    #[default]
    Comprehensive,
}

impl ReviewFocus {
    /// Every focus, in presentation order.
    pub const ALL: [ReviewFocus; 4] = [
        ReviewFocus::Methodology,
        ReviewFocus::Results,
        ReviewFocus::Limitations,
        ReviewFocus::Comprehensive,
    ];

    /// Lowercase identifier used in requests and reports.
    pub const fn as_str(self) -> &'static str {
        match self {
            ReviewFocus::Methodology => "methodology",
            ReviewFocus::Results => "results",
            ReviewFocus::Limitations => "limitations",
            ReviewFocus::Comprehensive => "comprehensive",
        }
    }

    /// Heading used in rendered reports.
    pub const fn title(self) -> &'static str {
        match self {
            ReviewFocus::Methodology => "Methodology",
            ReviewFocus::Results => "Results",
            ReviewFocus::Limitations => "Limitations",
            ReviewFocus::Comprehensive => "Comprehensive",
        }
    }

    /// Upper bound on words requested for each paper summary.
    pub const fn word_target(self) -> usize {
        match self {
            ReviewFocus::Methodology | ReviewFocus::Results => 150,
            ReviewFocus::Limitations => 100,
            ReviewFocus::Comprehensive => 200,
        }
    }

    /// Extraction prompt for one paper's text.
    pub fn extraction_prompt(self, text: &str) -> String {
        let words = self.word_target();
        match self {
            ReviewFocus::Methodology => format!(
                "Analyze ONLY the methodology of this paper:\n\n{text}\n\n\
                 Extract and summarize:\n\
                 1. **Study type**: experimental, observational, review, etc.\n\
                 2. **Sample**: size and characteristics\n\
                 3. **Techniques/Methods**: main approaches used\n\
                 4. **Data analysis**: how the data was analyzed\n\n\
                 Be concise (at most {words} words)."
            ),
            ReviewFocus::Results => format!(
                "Analyze ONLY the results of this paper:\n\n{text}\n\n\
                 Extract:\n\
                 1. **Main findings**: the three most important results\n\
                 2. **Quantitative data**: percentages and statistical values\n\
                 3. **Significance**: what the results indicate\n\n\
                 Be concise (at most {words} words)."
            ),
            ReviewFocus::Limitations => format!(
                "Analyze the limitations of this paper:\n\n{text}\n\n\
                 Identify:\n\
                 1. **Methodological limitations**: problems with the method\n\
                 2. **Sampling limitations**: problems with the sample\n\
                 3. **Research gaps**: what remains to be investigated\n\n\
                 Be concise (at most {words} words)."
            ),
            ReviewFocus::Comprehensive => format!(
                "Write an executive summary of this paper:\n\n{text}\n\n\
                 Structure it as:\n\
                 1. **Objective**: why the study was done\n\
                 2. **Methodology**: how it was done, briefly\n\
                 3. **Results**: what was found\n\
                 4. **Conclusion**: main implications\n\n\
                 Be concise (at most {words} words)."
            ),
        }
    }
}

impl fmt::Display for ReviewFocus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewFocus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "methodology" | "methods" => Ok(ReviewFocus::Methodology),
            "results" => Ok(ReviewFocus::Results),
            "limitations" => Ok(ReviewFocus::Limitations),
            "comprehensive" | "complete" | "full" => Ok(ReviewFocus::Comprehensive),
            other => Err(format!(
                "unknown review focus '{other}' (expected one of: methodology, results, limitations, comprehensive)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_targets_follow_focus() {
        let targets: Vec<usize> = ReviewFocus::ALL
            .iter()
            .map(|focus| focus.word_target())
            .collect();
        assert_eq!(targets, vec![150, 150, 100, 200]);
    }

    #[test]
    fn prompts_embed_text_and_budget() {
        let prompt = ReviewFocus::Limitations.extraction_prompt("PAPER BODY");
        assert!(prompt.contains("PAPER BODY"));
        assert!(prompt.contains("at most 100 words"));
        assert!(prompt.contains("Research gaps"));
    }

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("Methodology".parse::<ReviewFocus>(), Ok(ReviewFocus::Methodology));
        assert_eq!(" results ".parse::<ReviewFocus>(), Ok(ReviewFocus::Results));
        assert_eq!("complete".parse::<ReviewFocus>(), Ok(ReviewFocus::Comprehensive));
        assert!("vibes".parse::<ReviewFocus>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let value = serde_json::to_value(ReviewFocus::Limitations).expect("json");
        assert_eq!(value, "limitations");
        assert_eq!(ReviewFocus::Comprehensive.to_string(), "comprehensive");
    }
}
