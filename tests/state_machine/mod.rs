mod coordinator;
mod transitions;
