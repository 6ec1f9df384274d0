//! App market taxonomy
//!
//! A fixed two-level category table plus the closed option sets an upload
//! has to pick from. Uploads outside these sets never reach the review queue.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main category -> sub categories
pub const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Action & Adventure",
        &["Parkour", "Online RPG", "Racing & Sports", "Flight", "Shooter", "Fighting"],
    ),
    (
        "Casual & Puzzle",
        &["Casual", "Board & Card", "Simulation", "Strategy", "Tower Defense", "Kids"],
    ),
    ("Video & Audio", &["Video", "Music", "Live Streaming", "Radio", "Player"]),
    ("Tools", &["System", "Security", "Browser", "Input Method", "Utilities"]),
    ("Social", &["Chat", "Dating", "Messaging", "Friends", "Community"]),
    ("Books & Reading", &["Audiobooks", "Comics", "E-books", "Novels", "Magazines"]),
    ("Shopping", &["E-commerce", "Group Buying", "Cross-border", "Deals", "Fashion"]),
    ("Photography", &["Photo Editing", "Camera", "Photo Sharing", "Gallery", "Video"]),
    ("Education", &["Languages", "Exams", "Learning", "Parenting", "Driving Test"]),
    (
        "Travel & Transport",
        &["Ride Hailing", "Maps", "Travel", "Hotels", "Tickets", "Transit"],
    ),
    (
        "Finance",
        &["Banking", "Stocks", "Funds", "Bookkeeping", "Payments", "Loans"],
    ),
    ("Entertainment", &["Funny", "Pastime", "Horoscope", "Jokes"]),
    ("News", &["News", "Information", "Technology", "Trending", "Headlines"]),
    (
        "Home & Life",
        &["Alarm", "Traffic Fines", "Weather & Calendar", "Food", "Movie Tickets", "Home"],
    ),
    ("Sports", &["Fitness", "Pedometer", "Ball Games", "Live Streaming"]),
    (
        "Health",
        &["Weight Loss", "Period Tracker", "Wellness", "Pregnancy", "Beauty", "Medical"],
    ),
    ("Productivity", &["Office", "Email", "Notes", "Cloud Drive", "Calendar"]),
    ("Device Tweaks", &["System", "Scheduling", "Theming", "Other"]),
    (
        "Vendor System Apps",
        &[
            "OPPO", "realme", "Huawei", "Honor", "Xiaomi", "vivo", "Samsung", "OnePlus",
            "Gionee", "LG", "Hisense", "Sharp", "Motorola", "Google", "iQOO", "Red Magic",
            "Meizu", "TCL", "Baidu", "Xiaolajiao", "Fairphone", "Nothing", "nubia", "Sony",
            "Nokia", "Black Shark", "Lenovo", "Vertu", "ASUS", "Coolpad", "Philips", "LeEco",
            "Doov", "FreemeOS", "HTC", "Royole", "BlackBerry", "AGM", "8848", "TD Tech",
            "ROG", "ZTE", "Other",
        ],
    ),
];

/// Whether `(main, sub)` is a known category pair
pub fn is_known_category(main: &str, sub: &str) -> bool {
    sub_categories(main).map_or(false, |subs| subs.contains(&sub))
}

/// Main categories in display order
pub fn main_categories() -> impl Iterator<Item = &'static str> {
    CATEGORIES.iter().map(|(main, _)| *main)
}

/// Sub categories of a main category
pub fn sub_categories(main: &str) -> Option<&'static [&'static str]> {
    CATEGORIES
        .iter()
        .find(|(name, _)| *name == main)
        .map(|(_, subs)| *subs)
}

macro_rules! option_set {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                #[allow(missing_docs)]
                $variant,
            )+
        }

        impl $name {
            /// Every accepted value
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire and column value
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }

            /// Parse a wire or column value
            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($value => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

option_set!(
    /// Distribution channel of an upload
    Channel {
        Official => "official",
        International => "international",
        Test => "test",
        Custom => "custom",
    }
);

option_set!(
    /// How much advertising the app shows
    AdLevel {
        None => "none",
        Few => "few",
        Many => "many",
        Adware => "adware",
    }
);

option_set!(
    /// Monetisation model
    PaymentType {
        Free => "free",
        InAppPurchases => "iap",
        FewInAppPurchases => "few_iap",
        Paid => "paid",
    }
);

option_set!(
    /// Who builds and runs the app
    OperationType {
        Team => "team",
        Indie => "indie",
        OpenSource => "opensource",
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_categories() {
        assert!(is_known_category("Tools", "Browser"));
        assert!(is_known_category("Vendor System Apps", "Other"));
        assert!(!is_known_category("Tools", "Racing & Sports"));
        assert!(!is_known_category("Weapons", "Browser"));
        assert_eq!(main_categories().count(), 19);
    }

    #[test]
    fn test_sub_categories_shared_names() {
        // "Video" lives under two different main categories
        assert!(sub_categories("Video & Audio").unwrap().contains(&"Video"));
        assert!(sub_categories("Photography").unwrap().contains(&"Video"));
        assert!(sub_categories("Nope").is_none());
    }

    #[test]
    fn test_option_sets() {
        assert_eq!(PaymentType::parse("few_iap"), Some(PaymentType::FewInAppPurchases));
        assert_eq!(AdLevel::None.as_str(), "none");
        assert_eq!(Channel::ALL.len(), 4);
        assert!(OperationType::parse("corporate").is_none());

        let parsed: OperationType = serde_json::from_str("\"opensource\"").unwrap();
        assert_eq!(parsed, OperationType::OpenSource);
        assert!(serde_json::from_str::<Channel>("\"beta\"").is_err());
    }
}
