use super::ParamSource::{Body, Path, Query};
use super::{HttpMethod, OperationDescriptor, ParamSpec};

pub fn descriptors() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "template.pool.info",
            HttpMethod::Get,
            true,
            vec![
                ParamSpec::number("filter", Query, -2),
                ParamSpec::number("start", Query, -1),
                ParamSpec::number("end", Query, -1),
            ],
        ),
        OperationDescriptor::new(
            "template.info",
            HttpMethod::Get,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::flag("extended", Query, false),
                ParamSpec::flag("decrypt", Query, false),
            ],
        ),
        OperationDescriptor::new(
            "template.allocate",
            HttpMethod::Post,
            true,
            vec![ParamSpec::text("template", Body, "")],
        ),
        OperationDescriptor::new(
            "template.update",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("template", Body, ""),
                ParamSpec::flag("merge", Body, true),
            ],
        ),
        OperationDescriptor::new(
            "template.instantiate",
            HttpMethod::Post,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("name", Body, ""),
                ParamSpec::number("copies", Body, 1),
                ParamSpec::flag("hold", Body, false),
                ParamSpec::text("template", Body, ""),
            ],
        ),
        OperationDescriptor::new(
            "template.clone",
            HttpMethod::Post,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("name", Body, ""),
                ParamSpec::flag("recursive", Body, false),
            ],
        ),
        OperationDescriptor::new(
            "template.rename",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("name", Body, ""),
            ],
        ),
        OperationDescriptor::new(
            "template.delete",
            HttpMethod::Delete,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::flag("recursive", Query, false),
            ],
        ),
    ]
}
