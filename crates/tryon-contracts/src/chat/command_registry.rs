#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
    pub arg_key: &'static str,
}

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "pose",
        action: "set_pose",
        arg_key: "pose",
    },
    CommandSpec {
        command: "instructions",
        action: "set_instructions",
        arg_key: "text",
    },
    CommandSpec {
        command: "apply",
        action: "apply_recommendation",
        arg_key: "index",
    },
    CommandSpec {
        command: "text_model",
        action: "set_text_model",
        arg_key: "model",
    },
    CommandSpec {
        command: "image_model",
        action: "set_image_model",
        arg_key: "model",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "person",
        action: "set_person",
        arg_key: "path",
    },
    CommandSpec {
        command: "garment",
        action: "set_garment",
        arg_key: "path",
    },
    CommandSpec {
        command: "snapshot",
        action: "capture_garment",
        arg_key: "path",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "generate",
        action: "generate",
        arg_key: "",
    },
    CommandSpec {
        command: "reset",
        action: "reset",
        arg_key: "",
    },
    CommandSpec {
        command: "clear",
        action: "clear",
        arg_key: "",
    },
    CommandSpec {
        command: "status",
        action: "status",
        arg_key: "",
    },
    CommandSpec {
        command: "help",
        action: "help",
        arg_key: "",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
        arg_key: "",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
        arg_key: "",
    },
];

pub const SESSION_HELP_COMMANDS: &[&str] = &[
    "/person",
    "/garment",
    "/snapshot",
    "/pose",
    "/instructions",
    "/generate",
    "/apply",
    "/reset",
    "/clear",
    "/status",
    "/text_model",
    "/image_model",
    "/quit",
];
