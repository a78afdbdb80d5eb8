//! Deterministic question classifier and canned queries
//!
//! Used whenever the language model cannot translate a question. Intents
//! are checked in a fixed order and the first match wins, so the order of
//! [`Intent::PRIORITY`] is significant: `TotalUsers` is checked before the
//! more specific user categories.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    TotalUsers,
    ActiveUsers,
    Mrr,
    Revenue,
    Churn,
    Signups,
    Subscriptions,
    Plans,
    PopularFeatures,
    Unclassified,
}

impl Intent {
    /// Evaluation order for [`classify`].
    pub const PRIORITY: [Intent; 9] = [
        Intent::TotalUsers,
        Intent::ActiveUsers,
        Intent::Mrr,
        Intent::Revenue,
        Intent::Churn,
        Intent::Signups,
        Intent::Subscriptions,
        Intent::Plans,
        Intent::PopularFeatures,
    ];

    /// Lower-case phrases; any one of them selects the intent.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Intent::TotalUsers => &["total users", "how many users", "user count", "number of users"],
            Intent::ActiveUsers => &["active users", "active customers"],
            Intent::Mrr => &["mrr", "monthly recurring revenue", "recurring revenue"],
            Intent::Revenue => &["revenue", "income", "earnings"],
            Intent::Churn => &["churn", "churned", "cancelled", "lost users"],
            Intent::Signups => &["signups", "new users", "registrations", "signed up"],
            Intent::Subscriptions => &["subscriptions", "paid users", "paying customers"],
            Intent::Plans => &["plans", "plan types", "subscription plans"],
            // Needs both words, see `matches`.
            Intent::PopularFeatures => &["features", "popular"],
            Intent::Unclassified => &[],
        }
    }

    fn matches(self, question: &str) -> bool {
        match self {
            Intent::PopularFeatures => self.keywords().iter().all(|k| question.contains(k)),
            _ => self.keywords().iter().any(|k| question.contains(k)),
        }
    }

    /// The read-only statement answering this intent. `Unclassified` falls
    /// back to the total user count.
    pub fn canned_query(self) -> &'static str {
        match self {
            Intent::TotalUsers | Intent::Unclassified => {
                "SELECT COUNT(*) AS total_users FROM users"
            }
            Intent::ActiveUsers => {
                "SELECT COUNT(*) AS active_users FROM users WHERE status = 'active'"
            }
            Intent::Mrr => {
                "SELECT ROUND(SUM(mrr), 2) AS monthly_recurring_revenue FROM subscriptions WHERE status = 'active'"
            }
            Intent::Revenue => {
                "SELECT ROUND(SUM(amount), 2) AS total_revenue FROM revenue WHERE \"date\" >= current_date - INTERVAL 1 YEAR"
            }
            Intent::Churn => {
                "SELECT COUNT(*) AS churned_users FROM users WHERE status = 'churned'"
            }
            Intent::Signups => {
                "SELECT COUNT(*) AS new_signups FROM users WHERE created_at >= current_date - INTERVAL 30 DAY"
            }
            Intent::Subscriptions => {
                "SELECT COUNT(*) AS total_subscriptions FROM subscriptions WHERE status = 'active'"
            }
            Intent::Plans => {
                "SELECT plan_type, COUNT(*) AS user_count FROM users GROUP BY plan_type ORDER BY user_count DESC LIMIT 100"
            }
            Intent::PopularFeatures => {
                "SELECT event_name AS feature_name, COUNT(*) AS usage_count FROM events GROUP BY event_name ORDER BY usage_count DESC LIMIT 10"
            }
        }
    }
}

/// Classify a question by case-insensitive substring match.
pub fn classify(question: &str) -> Intent {
    let question = question.to_lowercase();
    Intent::PRIORITY
        .iter()
        .copied()
        .find(|intent| intent.matches(&question))
        .unwrap_or(Intent::Unclassified)
}

/// Canned query for a question. Never fails and never calls the model.
pub fn fallback_query(question: &str) -> String {
    classify(question).canned_query().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOTAL_USERS: &str = "SELECT COUNT(*) AS total_users FROM users";

    #[test]
    fn test_total_user_keywords_map_to_count() {
        for question in [
            "How many users?",
            "What are our TOTAL USERS",
            "user count please",
            "Number of users signed up overall",
            "how many users are active?",
        ] {
            assert_eq!(classify(question), Intent::TotalUsers, "{}", question);
            assert_eq!(fallback_query(question), TOTAL_USERS);
        }
    }

    #[test]
    fn test_each_intent_is_reachable() {
        let cases = [
            ("Show me active users", Intent::ActiveUsers),
            ("What's our MRR?", Intent::Mrr),
            ("How much revenue did we make?", Intent::Revenue),
            ("What is our churn?", Intent::Churn),
            ("How many signups this month?", Intent::Signups),
            ("Count of paying customers", Intent::Subscriptions),
            ("Break down the plan types", Intent::Plans),
            ("Which features are most popular?", Intent::PopularFeatures),
            ("Tell me something interesting", Intent::Unclassified),
        ];
        for (question, expected) in cases {
            assert_eq!(classify(question), expected, "{}", question);
        }
    }

    #[test]
    fn test_priority_order_wins() {
        // "monthly recurring revenue" also contains "revenue"
        assert_eq!(classify("monthly recurring revenue trend"), Intent::Mrr);
        // "new users" would be a signup, but "how many users" comes first
        assert_eq!(classify("how many users are new users"), Intent::TotalUsers);
        // "churned" and "plans" both present
        assert_eq!(classify("churned users by plans"), Intent::Churn);
    }

    #[test]
    fn test_popular_features_needs_both_words() {
        assert_eq!(classify("list the features"), Intent::Unclassified);
        assert_eq!(classify("popular items"), Intent::Unclassified);
        assert_eq!(classify("POPULAR FEATURES"), Intent::PopularFeatures);
    }

    #[test]
    fn test_unclassified_defaults_to_total_users() {
        assert_eq!(fallback_query("what's the weather"), TOTAL_USERS);
        assert_eq!(fallback_query(""), TOTAL_USERS);
    }

    #[test]
    fn test_canned_queries_pass_the_safety_gate() {
        for intent in Intent::PRIORITY.iter().copied().chain([Intent::Unclassified]) {
            assert!(
                saasight_duck::validate(intent.canned_query()).is_ok(),
                "{:?}",
                intent
            );
        }
    }
}
