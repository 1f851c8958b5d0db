// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The host console variable store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use refresh_core::host::{ConsoleVars, Cvar, CvarFlags, CvarGroup, CvarValidator};

fn format_number(value: f32) -> String {
    format!("{value}")
}

fn is_safe_path(value: &str) -> bool {
    !value.contains("..")
        && !value.contains(':')
        && !value.starts_with('/')
        && !value.starts_with('\\')
}

/// Applies a validator and clamp range to `value`.
///
/// Unparsable numbers fall back to `reset` (itself validated) and paths that
/// try to escape fall back to `reset` as-is.
pub fn validate(
    name: &str,
    value: &str,
    reset: &str,
    validator: CvarValidator,
    range: Option<(f32, f32)>,
) -> String {
    let clamp = |mut v: f32| {
        if let Some((min, max)) = range {
            if v < min {
                log::warn!("'{name}' must be at least {min}");
                v = min;
            } else if v > max {
                log::warn!("'{name}' must be at most {max}");
                v = max;
            }
        }
        v
    };
    match validator {
        CvarValidator::None => value.to_owned(),
        CvarValidator::FsPath => {
            if is_safe_path(value) {
                value.to_owned()
            } else {
                log::warn!("'{name}' refuses unsafe path '{value}'");
                reset.to_owned()
            }
        }
        CvarValidator::Float | CvarValidator::Integer => {
            let parsed = value
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .or_else(|| {
                    log::warn!("'{name}' expects a number, got '{value}'");
                    reset.trim().parse::<f32>().ok()
                })
                .unwrap_or(0.0);
            let parsed = if validator == CvarValidator::Integer {
                parsed.trunc()
            } else {
                parsed
            };
            format_number(clamp(parsed))
        }
    }
}

/// Thread-safe registry of console variables.
#[derive(Debug, Default)]
pub struct CvarStore {
    vars: RwLock<HashMap<String, Arc<Cvar>>>,
    groups: Mutex<HashMap<CvarGroup, bool>>,
}

impl CvarStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str) -> String {
        name.to_ascii_lowercase()
    }

    /// Looks a variable up without creating it.
    pub fn find(&self, name: &str) -> Option<Arc<Cvar>> {
        self.vars
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&Self::key(name))
            .cloned()
    }

    fn mark_group(&self, cvar: &Cvar) {
        let group = cvar.group();
        if group != CvarGroup::None {
            self.groups
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(group, true);
        }
    }

    fn assign(&self, cvar: &Cvar, value: &str) {
        let (validator, range) = cvar.validation();
        let value = validate(cvar.name(), value, &cvar.reset_string(), validator, range);
        if cvar.store(&value) {
            log::trace!("{} = \"{}\"", cvar.name(), value);
            self.mark_group(cvar);
        }
    }

    /// Sets a variable as a user would from the console, honouring the
    /// read-only, init-only and latched flags. Returns `false` when refused.
    pub fn set_from_console(&self, name: &str, value: &str) -> bool {
        let Some(cvar) = self.find(name) else {
            self.set(name, value);
            return true;
        };
        let flags = cvar.flags();
        if flags.intersects(CvarFlags::ROM) {
            log::warn!("{name} is read only.");
            return false;
        }
        if flags.intersects(CvarFlags::INIT) {
            log::warn!("{name} is write protected.");
            return false;
        }
        if flags.intersects(CvarFlags::LATCH) {
            let (validator, range) = cvar.validation();
            let value = validate(name, value, &cvar.reset_string(), validator, range);
            cvar.store_latched(&value);
            if cvar.latched().is_some() {
                log::info!("{name} will be changed upon restarting.");
            }
            return true;
        }
        self.assign(&cvar, value);
        true
    }

    /// Promotes every latched value. Returns the names that changed.
    pub fn apply_latched(&self) -> Vec<String> {
        let vars: Vec<Arc<Cvar>> = self
            .vars
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        let mut changed = Vec::new();
        for cvar in vars {
            if cvar.apply_latched() {
                self.mark_group(&cvar);
                changed.push(cvar.name().to_owned());
            }
        }
        changed.sort();
        changed
    }

    /// Snapshot of every variable value, sorted by name.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.vars
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|cvar| (cvar.name().to_owned(), cvar.string()))
            .collect()
    }
}

impl ConsoleVars for CvarStore {
    fn get(&self, name: &str, default: &str, flags: CvarFlags) -> Arc<Cvar> {
        let key = Self::key(name);
        let mut vars = self.vars.write().unwrap_or_else(|e| e.into_inner());
        vars.entry(key)
            .or_insert_with(|| Arc::new(Cvar::new(name, default, flags)))
            .clone()
    }

    fn set(&self, name: &str, value: &str) {
        let cvar = match self.find(name) {
            Some(cvar) => cvar,
            None => self.get(name, value, CvarFlags::USER_CREATED),
        };
        self.assign(&cvar, value);
    }

    fn set_value(&self, name: &str, value: f32) {
        self.set(name, &format_number(value));
    }

    fn check_range(&self, cvar: &Cvar, min: &str, max: &str, validator: CvarValidator) {
        let parse = |text: &str, fallback: f32| {
            if text.trim().is_empty() {
                fallback
            } else {
                text.trim().parse().unwrap_or(fallback)
            }
        };
        let range = match validator {
            CvarValidator::Float | CvarValidator::Integer
                if !(min.trim().is_empty() && max.trim().is_empty()) =>
            {
                Some((parse(min, f32::MIN), parse(max, f32::MAX)))
            }
            _ => None,
        };
        cvar.store_validation(validator, range);
        self.assign(cvar, &cvar.string());
    }

    fn set_description(&self, cvar: &Cvar, description: &str) {
        cvar.store_description(description);
    }

    fn set_group(&self, cvar: &Cvar, group: CvarGroup) {
        cvar.store_group(group);
    }

    fn check_group(&self, group: CvarGroup) -> bool {
        self.groups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&group)
            .copied()
            .unwrap_or(false)
    }

    fn reset_group(&self, group: CvarGroup, reset_modified_flags: bool) {
        self.groups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(group, false);
        if reset_modified_flags {
            let vars = self.vars.read().unwrap_or_else(|e| e.into_inner());
            vars.values()
                .filter(|cvar| cvar.group() == group)
                .for_each(|cvar| cvar.clear_modified());
        }
    }

    fn variable_string(&self, name: &str) -> String {
        self.find(name).map(|cvar| cvar.string()).unwrap_or_default()
    }

    fn variable_integer(&self, name: &str) -> i32 {
        self.find(name).map(|cvar| cvar.integer()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_keeps_existing_value_and_is_case_insensitive() {
        let store = CvarStore::new();
        let a = store.get("r_picmip", "1", CvarFlags::ARCHIVE);
        store.set("R_PICMIP", "2");
        let b = store.get("r_PicMip", "1", CvarFlags::EMPTY);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.integer(), 2);
        assert_eq!(store.variable_integer("r_picmip"), 2);
        assert_eq!(store.variable_string("missing"), "");
    }

    #[test]
    fn check_range_clamps_and_truncates() {
        let store = CvarStore::new();
        let cvar = store.get("r_maxpolys", "100000", CvarFlags::EMPTY);
        store.check_range(&cvar, "600", "30000", CvarValidator::Integer);
        assert_eq!(cvar.integer(), 30000);
        store.set("r_maxpolys", "12.7");
        assert_eq!(cvar.string(), "600");
        store.set("r_maxpolys", "1200.9");
        assert_eq!(cvar.string(), "1200");
        store.set("r_maxpolys", "nonsense");
        assert_eq!(cvar.string(), "30000");
    }

    #[test]
    fn fs_path_validator_rejects_escapes() {
        let store = CvarStore::new();
        let cvar = store.get("r_screenshotDir", "screenshots", CvarFlags::EMPTY);
        store.check_range(&cvar, "", "", CvarValidator::FsPath);
        store.set("r_screenshotDir", "../etc");
        assert_eq!(cvar.string(), "screenshots");
    }

    #[test]
    fn group_modification_is_tracked_until_reset() {
        let store = CvarStore::new();
        let cvar = store.get("r_mode", "3", CvarFlags::EMPTY);
        store.set_group(&cvar, CvarGroup::Renderer);
        assert!(!store.check_group(CvarGroup::Renderer));
        store.set_value("r_mode", 4.0);
        assert!(store.check_group(CvarGroup::Renderer));
        store.reset_group(CvarGroup::Renderer, true);
        assert!(!store.check_group(CvarGroup::Renderer));
        assert!(!cvar.is_modified());
    }

    #[test]
    fn console_writes_honour_protection_flags() {
        let store = CvarStore::new();
        let rom = store.get("version", "1.0", CvarFlags::ROM);
        let latched = store.get("r_stereo", "0", CvarFlags::LATCH);
        assert!(!store.set_from_console("version", "2.0"));
        assert_eq!(rom.string(), "1.0");
        assert!(store.set_from_console("r_stereo", "1"));
        assert_eq!(latched.string(), "0");
        assert_eq!(store.apply_latched(), vec!["r_stereo".to_owned()]);
        assert_eq!(latched.string(), "1");
    }
}
