use iocraft::prelude::*;
use tokio::sync::watch;
use tusc::UploadSummary;

const BAR_WIDTH: usize = 40;

#[derive(Default, Props)]
pub struct ProgressBarProps {
    pub title: String,
    pub progress: Option<watch::Receiver<f32>>,
}

#[component]
pub fn ProgressBar(props: &ProgressBarProps, mut hooks: Hooks) -> impl Into<AnyElement<'static>> {
    let mut percent = hooks.use_state(|| 0.0f32);
    let progress = props.progress.clone();

    hooks.use_future(async move {
        let Some(mut progress) = progress else {
            return;
        };
        while progress.changed().await.is_ok() {
            let value = *progress.borrow_and_update();
            percent.set(value);
        }
    });

    let value = percent.get().clamp(0.0, 100.0);
    let filled = ((value / 100.0) * BAR_WIDTH as f32).round() as usize;
    let bar = format!(
        "{}{}",
        "█".repeat(filled),
        "░".repeat(BAR_WIDTH.saturating_sub(filled))
    );

    element! {
        View(flex_direction: FlexDirection::Column) {
            Text(weight: Weight::Bold, content: props.title.clone())
            View(flex_direction: FlexDirection::Row) {
                Text(color: Color::Cyan, content: bar)
                Text(content: format!(" {:>5.1}%", value))
            }
        }
    }
}

#[derive(Default, Props)]
pub struct MessageProps {
    pub message: String,
}

#[component]
pub fn SuccessMessage(props: &MessageProps) -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Row) {
            Text(color: Color::Green, content: "◆ ")
            Text(content: props.message.clone())
        }
    }
}

#[component]
pub fn ErrorMessage(props: &MessageProps) -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Row) {
            Text(color: Color::Red, content: "▲ ")
            Text(content: props.message.clone())
        }
    }
}

#[derive(Default, Props)]
pub struct SummaryListProps {
    pub summary: UploadSummary,
}

#[component]
pub fn SummaryList(props: &SummaryListProps) -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Column) {
            #(props.summary.iter().enumerate().map(|(index, (location, result))| {
                element! {
                    View(flex_direction: FlexDirection::Row) {
                        Text(content: format!("│ {:>4} ", index))
                        Text(color: Color::Green, content: result.status.as_u16().to_string())
                        Text(content: format!(" {:>10} B  {}", result.bytes, location))
                    }
                }
            }))
        }
    }
}
