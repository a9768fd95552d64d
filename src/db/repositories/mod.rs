mod focuses;
mod settings;
