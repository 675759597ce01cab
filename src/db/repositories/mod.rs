mod book;
mod kv;
mod profile;
