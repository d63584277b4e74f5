mod connection;
mod orchestrator;
mod queue;
mod script_name;
mod support;
