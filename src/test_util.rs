#[cfg(test)]
pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    if let Some(old) = old_home {
        unsafe { std::env::set_var("HOME", old) };
    } else {
        unsafe { std::env::remove_var("HOME") };
    }
    result
}

/// Every character advances by the same amount, so widths are exact.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinearMeasurer {
    em_per_char: f32,
}

#[cfg(test)]
impl LinearMeasurer {
    pub(crate) fn new(em_per_char: f32) -> Self {
        Self { em_per_char }
    }
}

#[cfg(test)]
impl crate::overlay::TextMeasurer for LinearMeasurer {
    fn advance_em(&self, text: &str) -> anyhow::Result<f32> {
        Ok(text.chars().count() as f32 * self.em_per_char)
    }
}

/// Wraps another measurer and counts height queries.
#[cfg(test)]
pub(crate) struct CountingMeasurer<M> {
    inner: M,
    calls: std::cell::Cell<usize>,
}

#[cfg(test)]
impl<M> CountingMeasurer<M> {
    pub(crate) fn new(inner: M) -> Self {
        Self {
            inner,
            calls: std::cell::Cell::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }
}

#[cfg(test)]
impl<M: crate::overlay::TextMeasurer> crate::overlay::TextMeasurer for CountingMeasurer<M> {
    fn advance_em(&self, text: &str) -> anyhow::Result<f32> {
        self.inner.advance_em(text)
    }

    fn measure(
        &self,
        text: &str,
        max_width: f32,
        font_size: f32,
        style: &crate::overlay::FontStyle,
    ) -> anyhow::Result<f32> {
        self.calls.set(self.calls.get() + 1);
        self.inner.measure(text, max_width, font_size, style)
    }
}

#[cfg(test)]
pub(crate) struct FailingMeasurer;

#[cfg(test)]
impl crate::overlay::TextMeasurer for FailingMeasurer {
    fn advance_em(&self, _text: &str) -> anyhow::Result<f32> {
        Err(anyhow::anyhow!("measurement unavailable"))
    }
}
