//! Request-scoped execution context.
//!
//! A [`Ctx`] carries what a statement needs besides its SQL: the executor it
//! runs on (a bound transaction or a plain connection), a cancellation token,
//! and an optional deadline. Contexts are passed explicitly down the call
//! chain. Binding an executor produces a child context that mutably borrows
//! its parent, so the parent cannot issue statements while the child lives and
//! is unchanged once the child is gone.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ConnectorError;
use crate::pool::DbConn;
use crate::results::ResultSet;
use crate::template::Rendered;
use crate::transaction::Tx;

enum Bound<'a> {
    None,
    Tx(&'a mut Tx),
    Conn(&'a mut DbConn),
}

pub struct Ctx<'a> {
    bound: Bound<'a>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    statement_timeout: Option<Duration>,
}

impl std::fmt::Debug for Ctx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bound = match &self.bound {
            Bound::None => "none".to_string(),
            Bound::Tx(tx) => format!("tx#{}", tx.id()),
            Bound::Conn(_) => "conn".to_string(),
        };
        f.debug_struct("Ctx")
            .field("bound", &bound)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Default for Ctx<'static> {
    fn default() -> Self {
        Self::background()
    }
}

impl Ctx<'static> {
    /// A root context: nothing bound, never cancelled, no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// A root context that fails its statements once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            bound: Bound::None,
            cancel: token,
            deadline: None,
            statement_timeout: None,
        }
    }
}

impl<'a> Ctx<'a> {
    /// Limit the remaining lifetime of this context to `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Set a deadline. An earlier existing deadline wins.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub(crate) fn with_statement_timeout(mut self, timeout: Option<Duration>) -> Self {
        if timeout.is_some() {
            self.statement_timeout = timeout;
        }
        self
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// True when statements on this context have an executor to run on.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        !matches!(self.bound, Bound::None)
    }

    /// Bind `tx` into a child context.
    ///
    /// The child inherits cancellation and deadline; the parent keeps whatever
    /// it had bound.
    pub fn bind<'b>(&'b mut self, tx: &'b mut Tx) -> Ctx<'b> {
        Ctx {
            bound: Bound::Tx(tx),
            cancel: self.cancel.clone(),
            deadline: self.deadline,
            statement_timeout: self.statement_timeout,
        }
    }

    pub(crate) fn bind_conn<'b>(&'b mut self, conn: &'b mut DbConn) -> Ctx<'b> {
        Ctx {
            bound: Bound::Conn(conn),
            cancel: self.cancel.clone(),
            deadline: self.deadline,
            statement_timeout: self.statement_timeout,
        }
    }

    /// The transaction bound to this context, if any.
    pub fn lookup(&mut self) -> Option<&mut Tx> {
        match &mut self.bound {
            Bound::Tx(tx) => Some(&mut **tx),
            Bound::None | Bound::Conn(_) => None,
        }
    }

    /// A child context sharing this context's executor, for nested calls.
    pub fn reborrow(&mut self) -> Ctx<'_> {
        let bound = match &mut self.bound {
            Bound::None => Bound::None,
            Bound::Tx(tx) => Bound::Tx(&mut **tx),
            Bound::Conn(conn) => Bound::Conn(&mut **conn),
        };
        Ctx {
            bound,
            cancel: self.cancel.clone(),
            deadline: self.deadline,
            statement_timeout: self.statement_timeout,
        }
    }

    /// Run a row-returning statement on the bound executor.
    ///
    /// # Errors
    /// `Unbound` with no executor, `Cancelled` or `Timeout` if the context
    /// ends first, otherwise the store's error.
    pub async fn query(&mut self, rendered: &Rendered) -> Result<ResultSet, ConnectorError> {
        let guard = self.guard_parts();
        match &mut self.bound {
            Bound::None => Err(ConnectorError::Unbound),
            Bound::Tx(tx) => guard.run(tx.query(rendered)).await,
            Bound::Conn(conn) => guard.run(conn.query(rendered)).await,
        }
    }

    /// Run a statement on the bound executor and return the affected row count.
    ///
    /// # Errors
    /// Same as [`Ctx::query`].
    pub async fn execute(&mut self, rendered: &Rendered) -> Result<usize, ConnectorError> {
        let guard = self.guard_parts();
        match &mut self.bound {
            Bound::None => Err(ConnectorError::Unbound),
            Bound::Tx(tx) => guard.run(tx.execute(rendered)).await,
            Bound::Conn(conn) => guard.run(conn.execute(rendered)).await,
        }
    }

    /// Race `fut` against this context's cancellation and deadline.
    pub(crate) async fn guard<T>(
        &self,
        fut: impl Future<Output = Result<T, ConnectorError>>,
    ) -> Result<T, ConnectorError> {
        self.guard_parts().run(fut).await
    }

    fn guard_parts(&self) -> Guard {
        let deadline = match self.statement_timeout {
            Some(limit) => {
                let statement_deadline = Instant::now() + limit;
                Some(self.deadline.map_or(statement_deadline, |d| d.min(statement_deadline)))
            }
            None => self.deadline,
        };
        Guard {
            cancel: self.cancel.clone(),
            deadline,
        }
    }
}

struct Guard {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Guard {
    async fn run<T>(
        self,
        fut: impl Future<Output = Result<T, ConnectorError>>,
    ) -> Result<T, ConnectorError> {
        if self.cancel.is_cancelled() {
            return Err(ConnectorError::Cancelled);
        }
        let timed = async {
            match self.deadline {
                Some(deadline) if Instant::now() >= deadline => Err(ConnectorError::Timeout),
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .unwrap_or_else(|_| Err(ConnectorError::Timeout)),
                None => fut.await,
            }
        };
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ConnectorError::Cancelled),
            res = timed => res,
        }
    }
}
