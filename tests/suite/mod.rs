mod config;
mod game_list;
mod game_session;
