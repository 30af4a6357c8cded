mod common;
mod reconciler;
