//! Help and usage texts.

use crate::commands::Reply;

pub struct HelpCommand {
    pub cmd: &'static str,
    pub info: &'static str,
    pub example: &'static str,
}

pub struct HelpSection {
    pub title: &'static str,
    pub cmds: &'static [HelpCommand],
}

pub const USAGE_CAL_ADD: HelpCommand = HelpCommand {
    cmd: "cal add {name} {type} {address}",
    info: "Add a calendar by choosing a name, and specifying the type (caldav or ical) and webaddress",
    example: "cal add personal caldav https://mysite.nl/calendar/3owevfu1d0rb3psw",
};

pub const USAGE_CAL_REMOVE: HelpCommand = HelpCommand {
    cmd: "cal remove {name}",
    info: "Remove the specified calendar from the bot",
    example: "",
};

pub const HELP_CAL: HelpSection = HelpSection {
    title: "Managing your calendars",
    cmds: &[
        HelpCommand {
            cmd: "cal",
            info: "List your calendars",
            example: "",
        },
        USAGE_CAL_ADD,
        USAGE_CAL_REMOVE,
    ],
};

pub const HELP_VIEW: HelpSection = HelpSection {
    title: "Viewing events in your calendars",
    cmds: &[
        HelpCommand {
            cmd: "today",
            info: "View your schedule for today",
            example: "",
        },
        HelpCommand {
            cmd: "week",
            info: "View your schedule for this week",
            example: "",
        },
        HelpCommand {
            cmd: "week {number}",
            info: "View your schedule for the specified week",
            example: "",
        },
        HelpCommand {
            cmd: "week {year} {number}",
            info: "View your schedule for the specified week",
            example: "",
        },
        HelpCommand {
            cmd: "last week",
            info: "View your schedule for last week",
            example: "",
        },
        HelpCommand {
            cmd: "next week",
            info: "View your schedule for next week",
            example: "",
        },
    ],
};

pub fn format_all_help() -> Reply {
    let mut lines = vec!["Use these commands to interact with the bot".to_string(), String::new()];
    let mut lines_f = vec![
        "<b>Use these commands to interact with the bot</b>".to_string(),
        String::new(),
    ];

    for (i, section) in [&HELP_CAL, &HELP_VIEW].into_iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
            lines_f.push(String::new());
        }
        let reply = format_help(section);
        lines.push(reply.msg);
        lines_f.push(reply.msg_formatted);
    }

    Reply::new(lines.join("\n"), lines_f.join("<br />\n"))
}

pub fn format_help(help: &HelpSection) -> Reply {
    let mut lines = vec![help.title.to_string()];
    let mut lines_f = vec![format!("<b>{}</b>", help.title)];

    for c in help.cmds {
        lines.push(format!("* {} - {}", c.cmd, c.info));
        lines_f.push(format!(
            "&nbsp;&#9702; <code>{}</code>&nbsp;&nbsp;-&nbsp;&nbsp;{}",
            c.cmd, c.info
        ));
    }

    Reply::new(lines.join("\n"), lines_f.join("<br />\n"))
}

pub fn format_usage(usage: &HelpCommand) -> Reply {
    let mut msg = format!("Usage: {}\n{}", usage.cmd, usage.info);
    let mut msg_f = format!("<b>Usage</b>: {}<br />\n{}", usage.cmd, usage.info);
    if !usage.example.is_empty() {
        msg.push_str(&format!("\n\nExample: {}", usage.example));
        msg_f.push_str(&format!("<br />\n<br />\n<b>Example</b>: {}", usage.example));
    }
    Reply::new(msg, msg_f)
}
