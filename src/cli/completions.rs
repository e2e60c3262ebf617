use clap::Parser;

/// Arguments for completions command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate bash completions:\n    xdgpak completions bash > ~/.bash_completion.d/xdgpak\n\n\
                  Generate zsh completions:\n    xdgpak completions zsh > ~/.zfunc/_xdgpak\n\n\
                  Generate fish completions:\n    xdgpak completions fish > ~/.config/fish/completions/xdgpak.fish")]
pub struct CompletionsArgs {
    /// Shell type (bash, elvish, fish, powershell, zsh)
    pub shell: String,
}
