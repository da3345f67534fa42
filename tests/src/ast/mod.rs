mod codec;
mod notes;
mod properties;
mod snapshot;
mod traversal;
