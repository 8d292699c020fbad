use anyhow::Result;

/// Key of the setting row that holds the pagination checkpoint.
pub const LAST_OFFSET_KEY: &str = "last_offset";

/// Key of the setting row stamped at the end of a completed run.
pub const LAST_RUN_KEY: &str = "last_run_at";

/// A key/value store for restart tokens and run flags.
pub trait SettingsStore {
    fn get_setting(&self, key: &str) -> Result<Option<String>>;
    fn set_setting(&self, key: &str, value: &str) -> Result<()>;
}

/// The search offset that the next run resumes from.
pub struct Checkpoint<'a, S: SettingsStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: SettingsStore + ?Sized> Checkpoint<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Stored offset, or 0 when unset or unreadable.
    pub fn load(&self) -> Result<u32> {
        let Some(raw) = self.store.get_setting(LAST_OFFSET_KEY)? else {
            return Ok(0);
        };
        match raw.trim().parse::<u32>() {
            Ok(offset) => Ok(offset),
            Err(_) => {
                tracing::warn!(value = %raw, "ignoring unparseable checkpoint");
                Ok(0)
            }
        }
    }

    pub fn save(&self, offset: u32) -> Result<()> {
        self.store.set_setting(LAST_OFFSET_KEY, &offset.to_string())?;
        tracing::debug!(offset, "checkpoint saved");
        Ok(())
    }

    pub fn reset(&self) -> Result<()> {
        self.save(0)
    }
}
