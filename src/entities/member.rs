use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Violation};

/// Directory entry for a user; the source of names and emails on bills.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Member {
    pub fn new(id: Uuid, name: String, email: String) -> Result<Self, Error> {
        let name = name.trim().to_string();
        let email = email.trim().to_lowercase();

        let mut violations = vec![];

        if name.is_empty() {
            violations.push(Violation::new("name", "please provide a name"));
        }

        // deliverability is the mail system's problem
        if !email.contains('@') {
            violations.push(Violation::new("email", "please provide a valid email"));
        }

        if !violations.is_empty() {
            return Err(Error::validation_error(violations));
        }

        Ok(Self {
            id,
            name,
            email,
            created_at: Utc::now(),
        })
    }
}

#[test]
fn member_fields_are_normalized() {
    let member = Member::new(Uuid::new_v4(), " Ravi ".into(), "Ravi@Example.com ".into()).unwrap();
    assert_eq!(member.name, "Ravi");
    assert_eq!(member.email, "ravi@example.com");

    let err = Member::new(Uuid::new_v4(), "".into(), "nope".into()).unwrap_err();
    assert_eq!(err.violations.len(), 2);
}
