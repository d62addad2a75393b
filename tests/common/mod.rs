//! Shared fixtures: a trimmed-down Unity iOS export and a host project.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const MAIN_MM: &str = r#"#include "RegisterFeatures.h"
#include <csignal>

// Hack to work around iOS SDK 4.3 linker problem
// we need at least one __TEXT, __const section entry in main application .o files
// to get this section emitted at right time and so avoid LC_ENCRYPTION_INFO size miscalculation
static const int constsection = 0;

void UnityInitTrampoline();

const char* AppControllerClassName = "UnityAppController";

int main(int argc, char* argv[])
{
    @autoreleasepool
    {
        UnityInitTrampoline();
        UIApplicationMain(argc, argv, nil, [NSString stringWithUTF8String: AppControllerClassName]);
    }

    return 0;
}
"#;

pub const APP_CONTROLLER_H: &str = r#"#pragma once

@interface UnityAppController : NSObject<UIApplicationDelegate>
{
    UnityView*          _unityView;
}
@end

inline UnityAppController*  GetAppController()
{
    return (UnityAppController*)[UIApplication sharedApplication].delegate;
}

#define APP_CONTROLLER_RENDER_PLUGIN_METHOD(method)
"#;

pub const APP_CONTROLLER_MM: &str = r#"#import "UnityAppController.h"

@implementation UnityAppController

- (void)startUnity:(UIApplication*)application
{
    NSAssert(_unityAppReady == NO, @"[UnityAppController startUnity:] called after Unity has been initialized");

    UnityInitApplicationGraphics();
    [self createDisplayLinkAndStartRendering];
    _unityAppReady = YES;
}

- (void)applicationDidEnterBackground:(UIApplication*)application
{
    ::printf("-> applicationDidEnterBackground()\n");
}

@end
"#;

pub const METAL_HELPER_MM: &str = r#"extern "C" void CreateSharedDepthbufferMTL(UnityDisplaySurfaceMTL* surface)
{
    MTLTextureDescriptor* stencilTexDesc = [MTLTextureDescriptorClass texture2DDescriptorWithPixelFormat: MTLPixelFormatStencil8 width: surface->targetW height: surface->targetH mipmapped: NO];
    stencilTexDesc.sampleCount = surface->msaaSamples;
    surface->stencilRB = [surface->device newTextureWithDescriptor: stencilTexDesc];
}
"#;

pub const SPLASH_SCREEN_MM: &str = r#"#include "SplashScreen.h"

void ShowSplashScreen(UIWindow* window)
{
    bool hasStoryboard = [[NSBundle mainBundle] pathForResource: @"LaunchScreen" ofType: @"storyboardc"] != nullptr;

    if (hasStoryboard)
    {
        UIStoryboard *storyboard = [UIStoryboard storyboardWithName: @"LaunchScreen" bundle: [NSBundle mainBundle]];
        _controller = [storyboard instantiateInitialViewController];
    }
    else
    {
        _controller = [[SplashScreenController alloc] init];
    }
}
"#;

pub const ALL_TARGETS: &[(&str, &str)] = &[
    ("Classes/main.mm", MAIN_MM),
    ("Classes/UnityAppController.h", APP_CONTROLLER_H),
    ("Classes/UnityAppController.mm", APP_CONTROLLER_MM),
    ("Classes/Unity/MetalHelper.mm", METAL_HELPER_MM),
    ("Classes/UI/SplashScreen.mm", SPLASH_SCREEN_MM),
];

pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Export with every patch target plus a few untouched files per group.
pub fn setup_export() -> TempDir {
    let dir = TempDir::new().unwrap();
    for (rel, content) in ALL_TARGETS {
        write(dir.path(), rel, content);
    }
    write(dir.path(), "Classes/Native/Bulk_Generics_0.cpp", "// il2cpp output\n");
    write(dir.path(), "Libraries/libiPhone-lib.a", "!<arch>\n");
    write(dir.path(), "Data/level0", "level");
    write(dir.path(), "Data/Managed/Metadata/global-metadata.dat", "meta");
    dir
}

pub const PROJECT_NAME: &str = "DemoApp";

/// Host project with an empty manifest declaring the `DemoApp` target.
pub fn setup_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(format!("{PROJECT_NAME}.manifest.toml")),
        r#"# Xcode project manifest

[targets.DemoApp]
id = "A1B2C3D4E5F60718"

[[files]]
path = "DemoApp/AppDelegate.swift"
id = "0000000000000001"
targets = ["A1B2C3D4E5F60718"]
"#,
    )
    .unwrap();
    dir
}

pub fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap()
}
