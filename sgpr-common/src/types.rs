/// Listing category, one per source page on sgprapp.com
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    PR,
    Citizen,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::PR, Category::Citizen];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::PR => "PR",
            Category::Citizen => "Citizen",
        }
    }

    /// Listing page the category is scraped from
    pub fn default_url(&self) -> &'static str {
        match self {
            Category::PR => "http://sgprapp.com/listPage",
            Category::Citizen => "http://sgprapp.com/citizen",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pr" => Ok(Category::PR),
            "citizen" => Ok(Category::Citizen),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// Application status as shown in the listing's status column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApplicationStatus {
    #[default]
    Unknown,
    Approved,
    Rejected,
    Pending,
    Appeal,
}

impl ApplicationStatus {
    /// Map the site's Chinese status label. Unrecognized labels are `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "通过" => ApplicationStatus::Approved,
            "等待" => ApplicationStatus::Pending,
            "杯具" => ApplicationStatus::Rejected,
            "上诉中" => ApplicationStatus::Appeal,
            _ => ApplicationStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Unknown => "Unknown",
            ApplicationStatus::Approved => "Approved",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Pending => "Pending",
            ApplicationStatus::Appeal => "Appeal",
        }
    }

    pub fn as_emoji(&self) -> &'static str {
        match self {
            ApplicationStatus::Unknown => "❓",
            ApplicationStatus::Approved => "✅",
            ApplicationStatus::Rejected => "❌",
            ApplicationStatus::Pending => "⏳",
            ApplicationStatus::Appeal => "🔁",
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque subscription target: a numeric chat id or an `@channel` handle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DestinationId(String);

impl DestinationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for DestinationId {
    fn from(chat_id: i64) -> Self {
        Self(chat_id.to_string())
    }
}

impl std::fmt::Display for DestinationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels() {
        assert_eq!(ApplicationStatus::from_label("通过"), ApplicationStatus::Approved);
        assert_eq!(ApplicationStatus::from_label(" 等待 "), ApplicationStatus::Pending);
        assert_eq!(ApplicationStatus::from_label("杯具"), ApplicationStatus::Rejected);
        assert_eq!(ApplicationStatus::from_label("上诉中"), ApplicationStatus::Appeal);
        assert_eq!(ApplicationStatus::from_label("approved"), ApplicationStatus::Unknown);
        assert_eq!(ApplicationStatus::from_label(""), ApplicationStatus::Unknown);
    }

    #[test]
    fn test_category_round_trip_names() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
        assert_eq!("pr".parse::<Category>(), Ok(Category::PR));
        assert!("Unknown".parse::<Category>().is_err());
    }

    #[test]
    fn test_destination_id() {
        assert_eq!(DestinationId::from(-100123).as_str(), "-100123");
        assert_eq!(DestinationId::new(" @sgprapp ").as_str(), "@sgprapp");
    }
}
