//! Activity records as returned by the remote activities endpoint.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::deserialize_id;

/// One activity from the fitness service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityRecord {
    /// Service-side activity id (numeric or string on the wire)
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Service activity type code, e.g. `"Run"`
    #[serde(rename = "type", alias = "sport_type")]
    pub activity_type: String,
    /// User-given title
    #[serde(default)]
    pub name: Option<String>,
    /// Distance in meters
    #[serde(default)]
    pub distance: f64,
    /// Moving time in seconds
    #[serde(default, alias = "movingTimeSeconds")]
    pub moving_time: u64,
    /// Start time as sent by the service (RFC 3339)
    #[serde(alias = "startDate")]
    pub start_date: String,
}

impl ActivityRecord {
    /// Calendar bucket key (`YYYY-MM-DD`, UTC) for this activity.
    ///
    /// Returns `None` if the start date cannot be parsed.
    pub fn date_bucket(&self) -> Option<String> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.start_date) {
            return Some(dt.with_timezone(&Utc).format("%Y-%m-%d").to_string());
        }
        // Some payloads carry a bare date or a timestamp without offset
        let date_part = self.start_date.get(..10)?;
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .ok()
            .map(|d| d.format("%Y-%m-%d").to_string())
    }

    /// Moving time rounded to whole minutes.
    pub fn duration_minutes(&self) -> u32 {
        (self.moving_time as f64 / 60.0).round() as u32
    }

    /// Localized display label for the activity type.
    pub fn label(&self) -> &'static str {
        activity_label(&self.activity_type)
    }
}

/// Map a service activity type code to its display label.
pub fn activity_label(activity_type: &str) -> &'static str {
    match activity_type {
        "Run" | "VirtualRun" | "TrailRun" => "跑步",
        "Ride" | "VirtualRide" | "EBikeRide" | "MountainBikeRide" | "GravelRide" => "骑行",
        "Swim" => "游泳",
        "Walk" => "步行",
        "Hike" => "徒步",
        "Yoga" => "瑜伽",
        "WeightTraining" | "Crossfit" => "力量训练",
        "Workout" | "HighIntensityIntervalTraining" => "训练",
        "Rowing" | "Kayaking" | "Canoeing" => "划船",
        "AlpineSki" | "BackcountrySki" | "NordicSki" | "Snowboard" => "滑雪",
        "RockClimbing" => "攀岩",
        "Elliptical" => "椭圆机",
        "StairStepper" => "爬楼梯",
        _ => "其他运动",
    }
}

/// Body of the activities endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivitiesResponse {
    #[serde(default)]
    pub activities: Vec<ActivityRecord>,
}
