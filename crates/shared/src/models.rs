use serde::{Deserialize, Serialize};

pub const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Opening hours keyed by weekday label. `None` means closed or unknown.
///
/// Serializes as a JSON object with keys in weekday order, e.g.
/// `{"Mon":"11:00-22:00","Tue":null,...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hours {
    #[serde(rename = "Mon", default)]
    pub mon: Option<String>,
    #[serde(rename = "Tue", default)]
    pub tue: Option<String>,
    #[serde(rename = "Wed", default)]
    pub wed: Option<String>,
    #[serde(rename = "Thu", default)]
    pub thu: Option<String>,
    #[serde(rename = "Fri", default)]
    pub fri: Option<String>,
    #[serde(rename = "Sat", default)]
    pub sat: Option<String>,
    #[serde(rename = "Sun", default)]
    pub sun: Option<String>,
}

impl Hours {
    /// All days closed.
    pub fn closed() -> Self {
        Self::default()
    }

    /// Mutable slot for a day index where 0 is Monday.
    pub fn day_mut(&mut self, day: usize) -> Option<&mut Option<String>> {
        match day {
            0 => Some(&mut self.mon),
            1 => Some(&mut self.tue),
            2 => Some(&mut self.wed),
            3 => Some(&mut self.thu),
            4 => Some(&mut self.fri),
            5 => Some(&mut self.sat),
            6 => Some(&mut self.sun),
            _ => None,
        }
    }

    /// Days in weekday order with their open-close range.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<&str>)> {
        let days = [
            &self.mon, &self.tue, &self.wed, &self.thu, &self.fri, &self.sat, &self.sun,
        ];
        WEEKDAYS
            .into_iter()
            .zip(days)
            .map(|(label, range)| (label, range.as_deref()))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// A stored taco restaurant.
#[derive(Debug, Clone, PartialEq)]
pub struct Business {
    pub id: String,
    pub name: String,
    pub address: String,
    pub hours: Option<Hours>,
    pub best_taco: Option<String>,
}

/// A stored review.
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub id: i64,
    pub business_id: String,
    pub text: String,
    pub rating: Option<f64>,
    pub date: Option<String>,
}

/// A review as fetched, before it has been assigned a row id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub text: String,
    pub rating: Option<f64>,
    pub date: Option<String>,
}

impl NewReview {
    pub fn new(text: impl Into<String>, rating: Option<f64>, date: Option<String>) -> Self {
        Self {
            text: text.into(),
            rating,
            date,
        }
    }
}

/// A business as it appears in a search result page.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessSummary {
    pub id: String,
    pub name: String,
    pub address: String,
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub businesses: Vec<BusinessSummary>,
    /// Total number of matches the API reports for the query
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_json_keeps_weekday_order() {
        let mut hours = Hours::closed();
        hours.mon = Some("11:00-22:00".to_string());
        hours.sun = Some("10:00-15:00".to_string());

        let json = hours.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"Mon":"11:00-22:00","Tue":null,"Wed":null,"Thu":null,"Fri":null,"Sat":null,"Sun":"10:00-15:00"}"#
        );
        assert_eq!(Hours::from_json(&json).unwrap(), hours);
    }

    #[test]
    fn test_hours_missing_keys_are_closed() {
        let hours = Hours::from_json(r#"{"Fri":"17:00-02:00"}"#).unwrap();
        assert_eq!(hours.fri.as_deref(), Some("17:00-02:00"));
        assert!(hours.mon.is_none());
        assert_ne!(hours, Hours::closed());
    }

    #[test]
    fn test_day_mut_rejects_out_of_range() {
        let mut hours = Hours::closed();
        assert!(hours.day_mut(7).is_none());
        *hours.day_mut(2).unwrap() = Some("08:00-14:00".into());
        let open: Vec<_> = hours.iter().filter(|(_, r)| r.is_some()).collect();
        assert_eq!(open, vec![("Wed", Some("08:00-14:00"))]);
    }
}
