mod extract;
mod read;
