//! Interception hooks around cursor primitives.
//!
//! Every [`Wire`](super::Wire) primitive passes its arguments through the
//! matching pre-hook pipeline before touching storage and its result through
//! the post-hook pipeline afterwards. Hooks execute in registration order and
//! each hook's output becomes the next hook's input; an empty slot is the
//! identity pipeline. This is the seam the structure tracker observes reads
//! through, without the cursor knowing about it.
//!
//! Hooks receive a [`HookCtx`] snapshot of the cursor (taken before the
//! pipeline runs) instead of the cursor itself, so they can never re-enter
//! the operation they are intercepting.

/// Cursor state snapshot passed to every hook invocation
#[derive(Debug, Clone, Copy)]
pub struct HookCtx {
    /// Cursor offset at the time the operation was issued
    pub position: u64,
}

/// Pre-hook for sized operations: receives and may rewrite the byte count
pub type SizeFn = Box<dyn FnMut(&HookCtx, usize) -> usize>;

/// Post-hook for byte-producing operations: receives and may rewrite the bytes
pub type BytesFn = Box<dyn FnMut(&HookCtx, Vec<u8>) -> Vec<u8>>;

/// Hook for formatted operations: receives and may rewrite the format string
pub type FmtFn = Box<dyn FnMut(&HookCtx, String) -> String>;

/// A hook bound to the operation slot it intercepts.
///
/// This is the single installation surface: the variant selects the slot, the
/// boxed closure is appended to that slot's pipeline.
pub enum Hook {
    /// Runs before `read`, over the requested byte count
    PreRead(SizeFn),
    /// Runs after `read`, over the bytes produced
    PostRead(BytesFn),
    /// Runs at the start of a formatted read, over the canonical format
    FmtRead(FmtFn),
    /// Runs before `write`, over the bytes to be written
    PreWrite(BytesFn),
    /// Runs after `write`, over the count written
    PostWrite(SizeFn),
    /// Runs at the start of a formatted write, over the canonical format
    FmtWrite(FmtFn),
    /// Runs before `peek`, over the requested byte count
    PrePeek(SizeFn),
    /// Runs after `peek`, over the bytes produced
    PostPeek(BytesFn),
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = match self {
            Hook::PreRead(_) => "PreRead",
            Hook::PostRead(_) => "PostRead",
            Hook::FmtRead(_) => "FmtRead",
            Hook::PreWrite(_) => "PreWrite",
            Hook::PostWrite(_) => "PostWrite",
            Hook::FmtWrite(_) => "FmtWrite",
            Hook::PrePeek(_) => "PrePeek",
            Hook::PostPeek(_) => "PostPeek",
        };
        f.debug_tuple(slot).finish()
    }
}

/// Per-cursor hook slots, one ordered pipeline per operation
#[derive(Default)]
pub(crate) struct HookRegistry {
    pre_read: Vec<SizeFn>,
    post_read: Vec<BytesFn>,
    fmt_read: Vec<FmtFn>,
    pre_write: Vec<BytesFn>,
    post_write: Vec<SizeFn>,
    fmt_write: Vec<FmtFn>,
    pre_peek: Vec<SizeFn>,
    post_peek: Vec<BytesFn>,
}

fn run_size(pipeline: &mut [SizeFn], ctx: &HookCtx, n: usize) -> usize {
    pipeline.iter_mut().fold(n, |n, hook| hook(ctx, n))
}

fn run_bytes(pipeline: &mut [BytesFn], ctx: &HookCtx, bytes: Vec<u8>) -> Vec<u8> {
    pipeline.iter_mut().fold(bytes, |b, hook| hook(ctx, b))
}

fn run_fmt(pipeline: &mut [FmtFn], ctx: &HookCtx, fmt: String) -> String {
    pipeline.iter_mut().fold(fmt, |f, hook| hook(ctx, f))
}

impl HookRegistry {
    /// Appends a hook to its slot's pipeline
    pub(crate) fn install(&mut self, hook: Hook) {
        match hook {
            Hook::PreRead(f) => self.pre_read.push(f),
            Hook::PostRead(f) => self.post_read.push(f),
            Hook::FmtRead(f) => self.fmt_read.push(f),
            Hook::PreWrite(f) => self.pre_write.push(f),
            Hook::PostWrite(f) => self.post_write.push(f),
            Hook::FmtWrite(f) => self.fmt_write.push(f),
            Hook::PrePeek(f) => self.pre_peek.push(f),
            Hook::PostPeek(f) => self.post_peek.push(f),
        }
    }

    pub(crate) fn pre_read(&mut self, ctx: &HookCtx, n: usize) -> usize {
        run_size(&mut self.pre_read, ctx, n)
    }

    pub(crate) fn post_read(&mut self, ctx: &HookCtx, bytes: Vec<u8>) -> Vec<u8> {
        run_bytes(&mut self.post_read, ctx, bytes)
    }

    pub(crate) fn fmt_read(&mut self, ctx: &HookCtx, fmt: String) -> String {
        run_fmt(&mut self.fmt_read, ctx, fmt)
    }

    pub(crate) fn pre_write(&mut self, ctx: &HookCtx, bytes: Vec<u8>) -> Vec<u8> {
        run_bytes(&mut self.pre_write, ctx, bytes)
    }

    pub(crate) fn post_write(&mut self, ctx: &HookCtx, written: usize) -> usize {
        run_size(&mut self.post_write, ctx, written)
    }

    pub(crate) fn fmt_write(&mut self, ctx: &HookCtx, fmt: String) -> String {
        run_fmt(&mut self.fmt_write, ctx, fmt)
    }

    pub(crate) fn pre_peek(&mut self, ctx: &HookCtx, n: usize) -> usize {
        run_size(&mut self.pre_peek, ctx, n)
    }

    pub(crate) fn post_peek(&mut self, ctx: &HookCtx, bytes: Vec<u8>) -> Vec<u8> {
        run_bytes(&mut self.post_peek, ctx, bytes)
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("pre_read", &self.pre_read.len())
            .field("post_read", &self.post_read.len())
            .field("fmt_read", &self.fmt_read.len())
            .field("pre_write", &self.pre_write.len())
            .field("post_write", &self.post_write.len())
            .field("fmt_write", &self.fmt_write.len())
            .field("pre_peek", &self.pre_peek.len())
            .field("post_peek", &self.post_peek.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: HookCtx = HookCtx { position: 0 };

    #[test]
    fn test_empty_slot_is_identity() {
        let mut registry = HookRegistry::default();
        assert_eq!(registry.pre_read(&CTX, 7), 7);
        assert_eq!(registry.post_read(&CTX, vec![1, 2]), vec![1, 2]);
        assert_eq!(registry.fmt_read(&CTX, ">H".into()), ">H");
    }

    #[test]
    fn test_pipeline_runs_in_registration_order() {
        let mut registry = HookRegistry::default();
        registry.install(Hook::PreRead(Box::new(|_, n| n + 1)));
        registry.install(Hook::PreRead(Box::new(|_, n| n * 10)));
        // (3 + 1) * 10, not 3 * 10 + 1
        assert_eq!(registry.pre_read(&CTX, 3), 40);
    }

    #[test]
    fn test_hooks_can_rewrite_bytes() {
        let mut registry = HookRegistry::default();
        registry.install(Hook::PostRead(Box::new(|_, mut b| {
            b.reverse();
            b
        })));
        assert_eq!(registry.post_read(&CTX, vec![1, 2, 3]), vec![3, 2, 1]);
    }

    #[test]
    fn test_slots_are_independent() {
        let mut registry = HookRegistry::default();
        registry.install(Hook::PrePeek(Box::new(|_, _| 99)));
        assert_eq!(registry.pre_peek(&CTX, 1), 99);
        assert_eq!(registry.pre_read(&CTX, 1), 1);
    }
}
