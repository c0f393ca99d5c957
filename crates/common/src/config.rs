use std::env;

/// Deployment environment, used to select log formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Read from the `ENVIRONMENT` variable; anything other than
    /// "production"/"prod" falls back to development.
    pub fn from_env() -> Self {
        match env::var("ENVIRONMENT")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn production_aliases_are_recognized() {
        for value in ["production", "prod", "PROD"] {
            unsafe { env::set_var("ENVIRONMENT", value) };
            assert_eq!(Environment::from_env(), Environment::Production);
        }
        unsafe { env::remove_var("ENVIRONMENT") };
    }

    #[test]
    #[serial]
    fn unknown_or_unset_defaults_to_development() {
        unsafe { env::set_var("ENVIRONMENT", "staging") };
        assert_eq!(Environment::from_env(), Environment::Development);
        unsafe { env::remove_var("ENVIRONMENT") };
        assert_eq!(Environment::from_env(), Environment::Development);
    }
}
