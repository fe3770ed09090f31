mod test_chatlog;
mod test_chatwipe;
mod test_login;
