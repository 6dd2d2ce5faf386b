use crate::enhance::EnhanceOutcome;
use crate::error::EnhanceError;

#[derive(Debug)]
pub enum AppEvent {
    StatusTick(&'static str),
    EnhanceFinished(Result<EnhanceOutcome, EnhanceError>),
}
