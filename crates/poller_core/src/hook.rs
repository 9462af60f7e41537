use thiserror::Error;

use crate::Item;

/// Outcome of classifying a fetched item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decision {
    #[default]
    Save,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("alteration hook `{hook}` failed: {message}")]
pub struct HookError {
    pub hook: String,
    pub message: String,
}

impl HookError {
    pub fn new(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            message: message.into(),
        }
    }
}

/// Per-item alteration hook. May rewrite the item and override the decision.
pub trait AlterHook: Send + Sync {
    fn name(&self) -> &str {
        "anonymous"
    }

    fn alter(&self, item: &mut Item, decision: &mut Decision) -> Result<(), HookError>;
}

impl<F> AlterHook for F
where
    F: Fn(&mut Item, &mut Decision) -> Result<(), HookError> + Send + Sync,
{
    fn alter(&self, item: &mut Item, decision: &mut Decision) -> Result<(), HookError> {
        self(item, decision)
    }
}

/// Ordered list of hooks, applied in registration order.
#[derive(Default)]
pub struct HookChain {
    hooks: Vec<Box<dyn AlterHook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn empty() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn register(&mut self, hook: impl AlterHook + 'static) -> &mut Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook over `item`, starting from `Decision::Save`.
    ///
    /// Later hooks see the item and decision left by earlier ones. The first
    /// failing hook stops the chain.
    pub fn classify(&self, item: &mut Item) -> Result<Decision, HookError> {
        let mut decision = Decision::default();
        for hook in &self.hooks {
            hook.alter(item, &mut decision)?;
        }
        Ok(decision)
    }
}

impl std::fmt::Debug for HookChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|hook| hook.name()))
            .finish()
    }
}

/// Skips items that reply to another post.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipReplies;

impl AlterHook for SkipReplies {
    fn name(&self) -> &str {
        "skip_replies"
    }

    fn alter(&self, item: &mut Item, decision: &mut Decision) -> Result<(), HookError> {
        let is_reply = item
            .field("in_reply_to_status_id_str")
            .or_else(|| item.field("in_reply_to_status_id"))
            .is_some_and(|value| !value.is_null());
        if is_reply {
            *decision = Decision::Skip;
        }
        Ok(())
    }
}

/// Skips reposts of someone else's post.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipRetweets;

impl AlterHook for SkipRetweets {
    fn name(&self) -> &str {
        "skip_retweets"
    }

    fn alter(&self, item: &mut Item, decision: &mut Decision) -> Result<(), HookError> {
        if item
            .field("retweeted_status")
            .is_some_and(|value| !value.is_null())
        {
            *decision = Decision::Skip;
        }
        Ok(())
    }
}
