use serde::{Deserialize, Serialize};

/// Registered passenger. `user_id` is both the lookup key and the
/// credential the client types in as its "password".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl User {
    // Профиль без имени и почты: так выглядит пассажир, купивший билет без регистрации
    pub fn with_id(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }
}
