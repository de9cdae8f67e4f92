mod library_tests;
mod user_tests;
