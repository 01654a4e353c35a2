use std::str::FromStr;
use std::time::Duration;

use crate::codec::duration;

pub trait OverrideByEnv {
    fn override_by_env(&mut self);
}

pub fn entry_override<T: FromStr>(value: &mut T, env_key: &str) -> bool {
    if let Ok(env_val) = std::env::var(env_key) {
        if let Ok(val) = env_val.parse::<T>() {
            *value = val;
            true
        } else {
            println!("failed to parse environment variable: {env_key}");
            false
        }
    } else {
        false
    }
}

pub fn entry_override_option<T: FromStr>(value: &mut Option<T>, env_key: &str) -> bool {
    if let Ok(env_val) = std::env::var(env_key) {
        if let Ok(val) = env_val.parse::<T>() {
            *value = Some(val);
            true
        } else {
            println!("failed to parse environment variable: {env_key}");
            false
        }
    } else {
        false
    }
}

pub fn entry_override_to_duration(value: &mut Duration, env_key: &str) -> bool {
    match std::env::var(env_key) {
        Ok(env_val) => match duration::parse_duration(&env_val) {
            Ok(val) => {
                *value = val;
                true
            }
            Err(_) => {
                println!("failed to parse environment variable: {env_key}");
                false
            }
        },
        Err(_) => false,
    }
}

/// Comma separated list, e.g. `GEOMETA_QUERY_AUTHORIZATIONS=admin,user`.
pub fn entry_override_to_vec_string(value: &mut Vec<String>, env_key: &str) -> bool {
    match std::env::var(env_key) {
        Ok(env_val) => {
            *value = env_val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            true
        }
        Err(_) => false,
    }
}
