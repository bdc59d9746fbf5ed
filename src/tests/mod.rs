mod allocator;
mod collision;
mod props;
mod sets;
mod snapshot;
