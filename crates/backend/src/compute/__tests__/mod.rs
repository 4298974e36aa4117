mod coordinator;
mod helpers;
mod lifecycle;
mod workers;
