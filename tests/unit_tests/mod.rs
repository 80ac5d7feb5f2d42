mod assembly;
mod estimate;
mod solve;
