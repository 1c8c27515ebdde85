use crate::error::Result;
use crate::value::{Row, Value};

/// Caller-supplied interception points around adapter mutations.
///
/// `before_*` methods run before any statement is issued and may adjust the
/// values or veto the call by returning an error. `after_*` methods observe
/// the committed outcome and cannot change it.
pub trait Interceptor {
    fn before_insert(&mut self, _values: &mut Row) -> Result<()> {
        Ok(())
    }

    fn after_insert(&mut self, _row: &Row) {}

    fn before_update(&mut self, _values: &mut Row) -> Result<()> {
        Ok(())
    }

    fn after_update(&mut self, _row: &Row) {}

    fn before_delete(&mut self, _id: &Value) -> Result<()> {
        Ok(())
    }

    fn after_delete(&mut self, _deleted: bool) {}
}
