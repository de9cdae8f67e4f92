mod account_tests;
mod game_tests;
