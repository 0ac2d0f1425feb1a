// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use crate::reconnection::{FixedReconnect, ReconnectionPolicy};
use std::time::Duration;

const DEFAULT_LOCALE: &str = "en";

static DEFAULT_RECONNECTION_POLICY: FixedReconnect = FixedReconnect {
    attempts: 5,
    delay: Duration::from_secs(1),
};

/// How the client identifies itself, and how the sender should behave.
#[derive(Clone)]
pub struct ConnectionParams {
    pub device_model: String,
    pub system_version: String,
    pub app_version: String,
    pub system_lang_code: String,
    pub lang_code: String,
    /// Consulted every time the connection breaks.
    pub reconnection_policy: &'static dyn ReconnectionPolicy,
    /// Requests at least this large are sent gzip-compressed when that makes them
    /// smaller. `None` disables compression.
    pub compression_threshold: Option<usize>,
    /// How many times the authorization key generation may be restarted from the
    /// beginning when the server asks to retry or the connection drops.
    pub auth_key_gen_attempts: usize,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        let info = os_info::get();

        let mut system_lang_code = String::new();
        let mut lang_code = String::new();

        #[cfg(not(target_os = "android"))]
        {
            system_lang_code.push_str(&locate_locale::system());
            lang_code.push_str(&locate_locale::user());
        }
        if system_lang_code.is_empty() {
            system_lang_code.push_str(DEFAULT_LOCALE);
        }
        if lang_code.is_empty() {
            lang_code.push_str(DEFAULT_LOCALE);
        }

        Self {
            device_model: format!("{} {}", info.os_type(), info.bitness()),
            system_version: info.version().to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            system_lang_code,
            lang_code,
            reconnection_policy: &DEFAULT_RECONNECTION_POLICY,
            compression_threshold: mtcore_proto::DEFAULT_COMPRESSION_THRESHOLD,
            auth_key_gen_attempts: 3,
        }
    }
}
