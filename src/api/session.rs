//! Transparent re-authentication for remote calls.
//!
//! [`SessionGuard::execute`] runs one remote operation with the current session.
//! When the server reports the session as expired, the guard logs in once,
//! swaps in the new session and retries the operation once. A second expiry is
//! reported as [`ApiError::AuthenticationFailed`]; there is no retry loop.
use super::error::ApiError;
use super::types::SessionId;
use std::future::Future;

/// Externally visible state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    /// A login was rejected; only an explicit [`SessionGuard::login`] leaves this state.
    LoginFailed,
}

#[derive(Debug, Default)]
enum Session {
    #[default]
    Unauthenticated,
    Authenticated(SessionId),
    LoginFailed,
}

#[derive(Debug, Default)]
pub struct SessionGuard {
    session: Session,
}

impl SessionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already established session.
    pub fn with_session(sid: SessionId) -> Self {
        Self {
            session: Session::Authenticated(sid),
        }
    }

    pub fn state(&self) -> SessionState {
        match self.session {
            Session::Unauthenticated => SessionState::Unauthenticated,
            Session::Authenticated(_) => SessionState::Authenticated,
            Session::LoginFailed => SessionState::LoginFailed,
        }
    }

    /// Explicit (user initiated) login. Also the only way out of `LoginFailed`.
    pub async fn login<L, LFut>(&mut self, mut login: L) -> Result<(), ApiError>
    where
        L: FnMut() -> LFut,
        LFut: Future<Output = Result<SessionId, ApiError>>,
    {
        self.establish(&mut login).await.map(|_| ())
    }

    /// Run `op` with a valid session, re-authenticating at most once.
    ///
    /// `login` is only called when there is no session yet or when `op` reports
    /// [`ApiError::SessionExpired`]. Errors other than expiry are returned
    /// unchanged and never trigger a login.
    pub async fn execute<T, L, LFut, Op, OpFut>(
        &mut self,
        mut login: L,
        mut op: Op,
    ) -> Result<T, ApiError>
    where
        L: FnMut() -> LFut,
        LFut: Future<Output = Result<SessionId, ApiError>>,
        Op: FnMut(SessionId) -> OpFut,
        OpFut: Future<Output = Result<T, ApiError>>,
    {
        let current = match &self.session {
            Session::Authenticated(sid) => Some(sid.clone()),
            Session::LoginFailed => {
                return Err(ApiError::AuthenticationFailed(
                    "previous login was rejected, log in again".to_string(),
                ))
            }
            Session::Unauthenticated => None,
        };
        let sid = match current {
            Some(sid) => sid,
            None => self.establish(&mut login).await?,
        };

        match op(sid).await {
            Err(ApiError::SessionExpired) => {}
            other => return other,
        }

        tracing::info!("Session expired, re-authenticating");
        self.session = Session::Unauthenticated;
        let sid = self.establish(&mut login).await?;

        match op(sid).await {
            Err(ApiError::SessionExpired) => {
                tracing::warn!("Session expired again right after re-authentication");
                self.session = Session::Unauthenticated;
                Err(ApiError::AuthenticationFailed(
                    "session expired again after re-login".to_string(),
                ))
            }
            other => other,
        }
    }

    async fn establish<L, LFut>(&mut self, login: &mut L) -> Result<SessionId, ApiError>
    where
        L: FnMut() -> LFut,
        LFut: Future<Output = Result<SessionId, ApiError>>,
    {
        match login().await {
            Ok(sid) => {
                self.session = Session::Authenticated(sid.clone());
                Ok(sid)
            }
            Err(ApiError::AuthenticationFailed(reason)) => {
                tracing::error!(reason = %reason, "Login rejected");
                self.session = Session::LoginFailed;
                Err(ApiError::AuthenticationFailed(reason))
            }
            Err(ApiError::SessionExpired) => {
                self.session = Session::LoginFailed;
                Err(ApiError::AuthenticationFailed(
                    "server refused the new session".to_string(),
                ))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Login failed");
                self.session = Session::Unauthenticated;
                Err(e)
            }
        }
    }
}
