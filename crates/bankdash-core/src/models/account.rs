use serde::{Deserialize, Serialize};

/// `GET /account/info`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountInfo {
    pub account_number: Option<String>,
    pub account_type: Option<String>,
    pub balance: Option<f64>,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub kyc_status: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AccountInfo {
    pub fn currency_code(&self) -> &str {
        self.currency.as_deref().unwrap_or("USD")
    }

    /// Account number with all but the last four digits hidden
    pub fn masked_account_number(&self) -> Option<String> {
        let number = self.account_number.as_deref()?;
        let chars: Vec<char> = number.chars().collect();
        if chars.len() <= 4 {
            return Some(number.to_string());
        }
        let visible: String = chars[chars.len() - 4..].iter().collect();
        Some(format!("{}{}", "*".repeat(chars.len() - 4), visible))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Notification {
    #[serde(alias = "_id")]
    pub id: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(alias = "isRead")]
    pub read: bool,
    pub created_at: Option<String>,
}

impl Notification {
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or("(no title)")
    }
}

/// Everything the dashboard overview shows
#[derive(Debug, Clone, Default)]
pub struct DashboardSnapshot {
    pub account: AccountInfo,
    pub notifications: Vec<Notification>,
}

impl DashboardSnapshot {
    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_account_number() {
        let mut info = AccountInfo {
            account_number: Some("1234567890".to_string()),
            ..Default::default()
        };
        assert_eq!(info.masked_account_number().as_deref(), Some("******7890"));

        info.account_number = Some("123".to_string());
        assert_eq!(info.masked_account_number().as_deref(), Some("123"));

        info.account_number = None;
        assert_eq!(info.masked_account_number(), None);
    }

    #[test]
    fn test_notification_decoding_variants() {
        let json = r#"[
            {"_id":"n1","title":"Deposit received","isRead":false,"createdAt":"2026-01-01T00:00:00Z"},
            {"id":"n2","message":"Card shipped","read":true}
        ]"#;
        let notes: Vec<Notification> = serde_json::from_str(json).unwrap();
        assert_eq!(notes[0].id.as_deref(), Some("n1"));
        assert_eq!(notes[0].display_title(), "Deposit received");
        assert_eq!(notes[1].display_title(), "Card shipped");

        let snapshot = DashboardSnapshot {
            account: AccountInfo::default(),
            notifications: notes,
        };
        assert_eq!(snapshot.unread_count(), 1);
    }

    #[test]
    fn test_account_info_is_lenient() {
        let info: AccountInfo =
            serde_json::from_str(r#"{"balance":1250.5,"tier":"gold"}"#).unwrap();
        assert_eq!(info.balance, Some(1250.5));
        assert_eq!(info.currency_code(), "USD");
        assert!(info.extra.contains_key("tier"));
    }
}
