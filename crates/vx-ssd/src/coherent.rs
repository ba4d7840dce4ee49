use vx_core::Error;

/// Lazily loaded value with a dirty flag.
///
/// Handles load their persisted state on first access and track local
/// modifications, so a save can be skipped when nothing changed and a
/// reload can be forced by invalidating.
#[derive(Debug, Clone, Default)]
pub struct Cached<T> {
    value: Option<T>,
    dirty: bool,
}

impl<T> Cached<T> {
    pub const fn empty() -> Self {
        Self {
            value: None,
            dirty: false,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.value.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn loaded(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Read access, loading on first use.
    pub fn get_or_try_load<F>(&mut self, load: F) -> Result<&T, Error>
    where
        F: FnOnce() -> Result<T, Error>,
    {
        if self.value.is_none() {
            self.value = Some(load()?);
        }
        match self.value.as_ref() {
            Some(v) => Ok(v),
            None => Err(Error::Consistency("cache load yielded nothing".to_owned())),
        }
    }

    /// Write access, loading on first use; marks the value dirty.
    pub fn get_mut_or_try_load<F>(&mut self, load: F) -> Result<&mut T, Error>
    where
        F: FnOnce() -> Result<T, Error>,
    {
        if self.value.is_none() {
            self.value = Some(load()?);
        }
        self.dirty = true;
        match self.value.as_mut() {
            Some(v) => Ok(v),
            None => Err(Error::Consistency("cache load yielded nothing".to_owned())),
        }
    }

    /// Replaces the value outright and marks it dirty.
    pub fn set(&mut self, value: T) {
        self.value = Some(value);
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Drops the cached value so the next access reloads from disk.
    pub fn invalidate(&mut self) {
        self.value = None;
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::Cached;
    use vx_core::Error;

    #[test]
    fn loads_once_and_tracks_dirtiness() {
        let mut cached: Cached<u32> = Cached::empty();
        assert!(!cached.is_loaded());

        let v = cached.get_or_try_load(|| Ok(7)).expect("load");
        assert_eq!(*v, 7);
        assert!(!cached.is_dirty());

        // Second load closure must not run.
        let v = cached
            .get_or_try_load(|| Err(Error::Consistency("reloaded".to_owned())))
            .expect("cached");
        assert_eq!(*v, 7);

        *cached.get_mut_or_try_load(|| Ok(0)).expect("mut") = 9;
        assert!(cached.is_dirty());

        cached.mark_clean();
        assert!(!cached.is_dirty());

        cached.invalidate();
        assert!(!cached.is_loaded());
    }

    #[test]
    fn load_failure_propagates_and_leaves_it_empty() {
        let mut cached: Cached<u32> = Cached::empty();
        let err = cached
            .get_or_try_load(|| Err(Error::Consistency("boom".to_owned())))
            .unwrap_err();
        assert_eq!(err, Error::Consistency("boom".to_owned()));
        assert!(!cached.is_loaded());
    }
}
