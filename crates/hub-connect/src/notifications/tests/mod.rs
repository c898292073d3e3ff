mod batch;
mod common;
mod dispatch;
