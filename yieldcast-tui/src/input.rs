use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Field, Screen};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Quit,
    /// Run `service.estimate`(...) with the current form
    Estimate,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{BackTab, Backspace, Char, Down, Enter, Esc, Left, Right, Tab, Up};

    // Global quit shortcut; plain `q` is a valid postcode letter
    if key.code == Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }

    let mut action = Action::None;

    match app.screen {
        Screen::Form => match key.code {
            Down | Tab => {
                app.form.focus = app.form.focus.next();
            }
            Up | BackTab => {
                app.form.focus = app.form.focus.previous();
            }
            Left if app.form.focus == Field::Orientation => {
                app.form.rotate_orientation(false);
            }
            Right | Char(' ') if app.form.focus == Field::Orientation => {
                app.form.rotate_orientation(true);
            }
            Char(character) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT)
                    && let Some(input) = app.form.focused_input()
                {
                    input.push(character);
                }
            }
            Backspace => {
                if let Some(input) = app.form.focused_input() {
                    input.pop();
                }
            }
            Enter => {
                action = Action::Estimate;
            }
            Esc => {
                action = Action::Quit;
            }
            _ => {}
        },

        Screen::Results => match key.code {
            Left | Esc | Char('b') => {
                app.screen = Screen::Form;
            }
            Char('q') => {
                action = Action::Quit;
            }
            _ => {}
        },
    }
    action
}
