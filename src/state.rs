use std::{ops::Deref, sync::Arc};

use crate::{
    error::ErrorVerbosity,
    store::{BookStore, StoreError},
    traits::StateProvider,
    types::Book,
};

#[derive(Clone)]
pub struct ApiState {
    inner: Arc<ApiStateInner>,
}

impl ApiState {
    pub fn new(error_verbosity: ErrorVerbosity, store: BookStore, fail_on_write_error: bool) -> Self {
        Self {
            inner: Arc::new(ApiStateInner {
                error_verbosity,
                store,
                fail_on_write_error,
            }),
        }
    }
}

impl Deref for ApiState {
    type Target = ApiStateInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub struct ApiStateInner {
    error_verbosity: ErrorVerbosity,
    store: BookStore,
    fail_on_write_error: bool,
}

impl ApiStateInner {
    pub fn store(&self) -> &BookStore {
        &self.store
    }

    /// Persists the collection after a mutation.
    ///
    /// Unless `fail_on_write_error` is set, a failed write is only logged and the
    /// request still reports success.
    pub async fn persist(&self, books: &[Book]) -> Result<(), StoreError> {
        match self.fail_on_write_error {
            true => self.store.try_write_all(books).await,
            false => {
                self.store.write_all(books).await;

                Ok(())
            }
        }
    }
}

impl StateProvider for ApiState {
    fn error_verbosity(&self) -> ErrorVerbosity {
        self.error_verbosity
    }
}
