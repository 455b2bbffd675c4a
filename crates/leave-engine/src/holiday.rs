//! Fixed paid holidays.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationErrors};

/// Highest accepted holiday priority.
pub const MAX_PRIORITY: u8 = 5;

/// A fixed paid day off. Holidays are not balance tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    #[serde(default)]
    pub name: String,
    /// Breaks ties between holidays on the same date; higher wins.
    #[serde(default)]
    pub priority: u8,
}

impl Holiday {
    pub fn new(date: NaiveDate, name: impl Into<String>, priority: u8) -> Result<Self> {
        let holiday = Holiday {
            date,
            name: name.into(),
            priority,
        };
        holiday.validate().into_result()?;
        Ok(holiday)
    }

    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if self.priority > MAX_PRIORITY {
            errors.push(
                "priority",
                format!("{} is not in 0..={}", self.priority, MAX_PRIORITY),
            );
        }
        errors
    }
}
