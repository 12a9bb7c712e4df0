mod applications;
mod common;
mod jobs;
mod sqlite;
