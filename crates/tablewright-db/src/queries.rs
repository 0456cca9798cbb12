/// Which side of the structural changes a raw statement runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPhase {
    Pre,
    Post,
}

/// A raw statement and the message reported if it fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedQuery {
    pub statement: String,
    pub message: Option<String>,
}

/// Raw statements run before and after the batched ALTERs.
#[derive(Debug, Default)]
pub struct QueryQueue {
    pre: Vec<QueuedQuery>,
    post: Vec<QueuedQuery>,
}

impl QueryQueue {
    pub fn push(
        &mut self,
        phase: QueryPhase,
        statement: impl Into<String>,
        message: Option<String>,
    ) {
        self.list_mut(phase).push(QueuedQuery {
            statement: statement.into(),
            message,
        });
    }

    pub fn queued(&self, phase: QueryPhase) -> &[QueuedQuery] {
        match phase {
            QueryPhase::Pre => &self.pre,
            QueryPhase::Post => &self.post,
        }
    }

    /// Empty the list for `phase`. Called once every statement in it ran.
    pub fn clear(&mut self, phase: QueryPhase) {
        self.list_mut(phase).clear();
    }

    fn list_mut(&mut self, phase: QueryPhase) -> &mut Vec<QueuedQuery> {
        match phase {
            QueryPhase::Pre => &mut self.pre,
            QueryPhase::Post => &mut self.post,
        }
    }
}
